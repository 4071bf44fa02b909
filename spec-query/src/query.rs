//! Deferred queries
//!
//! [`Queryable`] is the capability a query source exposes to the evaluator.
//! [`Query<T>`] is the source the repository hands out: every call appends
//! an operation to a [`QueryPlan`] and nothing runs until a store executes
//! the plan.
//!
//! # Example
//!
//! ```rust
//! use spec_query::expr::Predicate;
//! use spec_query::query::{Query, Queryable};
//! use spec_query::specification::SortKey;
//!
//! struct User;
//!
//! let query = Query::<User>::new("users")
//!     .filter(&Predicate::new(|u| u.field("active").eq(true)))
//!     .order_by(&SortKey::field("id"))
//!     .skip(2)
//!     .take(3);
//!
//! assert_eq!(query.plan().ops().len(), 4);
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, ParamId, Predicate};
use crate::specification::{Include, SortDirection, SortKey};

/// Operations a query source supports, each returning the refined source
///
/// Implementations must not execute anything; they describe work.
pub trait Queryable<T>: Sized {
    fn filter(self, predicate: &Predicate<T>) -> Self;

    fn include(self, include: &Include<T>) -> Self;

    /// Primary ordering; replaces the effect of any earlier ordering
    fn order_by(self, key: &SortKey<T>) -> Self;

    /// Tie-breaker applied after the current ordering
    fn then_by(self, key: &SortKey<T>) -> Self;

    fn skip(self, count: usize) -> Self;

    fn take(self, count: usize) -> Self;
}

/// Untyped sort key as recorded in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSortKey {
    pub param: ParamId,
    pub key: Expr,
    pub direction: SortDirection,
}

impl<T> From<&SortKey<T>> for PlanSortKey {
    fn from(key: &SortKey<T>) -> Self {
        Self {
            param: key.param(),
            key: key.key().clone(),
            direction: key.direction(),
        }
    }
}

impl fmt::Display for PlanSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.direction)
    }
}

/// One recorded step of a query plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueryOp {
    Filter { param: ParamId, body: Expr },
    Include { path: Vec<String> },
    OrderBy(PlanSortKey),
    ThenBy(PlanSortKey),
    Skip { count: usize },
    Take { count: usize },
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter { body, .. } => write!(f, "filter{}", Parenthesized(body)),
            Self::Include { path } => write!(f, "include({})", path.join(".")),
            Self::OrderBy(key) => write!(f, "order_by({})", key),
            Self::ThenBy(key) => write!(f, "then_by({})", key),
            Self::Skip { count } => write!(f, "skip({})", count),
            Self::Take { count } => write!(f, "take({})", count),
        }
    }
}

/// Avoids doubled parentheses around comparison and logical bodies
struct Parenthesized<'a>(&'a Expr);

impl fmt::Display for Parenthesized<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Compare { .. } | Expr::Logical { .. } | Expr::Arith { .. } => {
                write!(f, "{}", self.0)
            }
            other => write!(f, "({})", other),
        }
    }
}

/// Type-erased, ordered record of the operations applied to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    collection: String,
    ops: Vec<QueryOp>,
}

impl QueryPlan {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ops: Vec::new(),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn ops(&self) -> &[QueryOp] {
        &self.ops
    }

    /// The same plan without its skip and take steps
    ///
    /// Counting a windowed query counts the window, so callers that want the
    /// total use this first.
    #[must_use]
    pub fn without_window(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            ops: self
                .ops
                .iter()
                .filter(|op| !matches!(op, QueryOp::Skip { .. } | QueryOp::Take { .. }))
                .cloned()
                .collect(),
        }
    }

    fn push(&mut self, op: QueryOp) {
        self.ops.push(op);
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.collection)?;
        if self.ops.is_empty() {
            return write!(f, " all");
        }
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, " ->")?;
            }
            write!(f, " {}", op)?;
        }
        Ok(())
    }
}

/// Deferred query over the records of one collection
pub struct Query<T> {
    plan: QueryPlan,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Query<T> {
    /// Unfiltered query over `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            plan: QueryPlan::new(collection),
            _entity: PhantomData,
        }
    }

    #[must_use]
    pub const fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    #[must_use]
    pub fn into_plan(self) -> QueryPlan {
        self.plan
    }

    fn record(mut self, op: QueryOp) -> Self {
        self.plan.push(op);
        self
    }
}

impl<T> Queryable<T> for Query<T> {
    fn filter(self, predicate: &Predicate<T>) -> Self {
        self.record(QueryOp::Filter {
            param: predicate.param(),
            body: predicate.body().clone(),
        })
    }

    fn include(self, include: &Include<T>) -> Self {
        self.record(QueryOp::Include {
            path: include.segments().to_vec(),
        })
    }

    fn order_by(self, key: &SortKey<T>) -> Self {
        self.record(QueryOp::OrderBy(key.into()))
    }

    fn then_by(self, key: &SortKey<T>) -> Self {
        self.record(QueryOp::ThenBy(key.into()))
    }

    fn skip(self, count: usize) -> Self {
        self.record(QueryOp::Skip { count })
    }

    fn take(self, count: usize) -> Self {
        self.record(QueryOp::Take { count })
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("plan", &self.plan).finish()
    }
}
