//! Expression tree nodes
//!
//! Predicates are inspectable trees rather than closures so a store can
//! translate them into its own query language. Nodes are built with the
//! fluent methods on [`Expr`]:
//!
//! ```rust
//! use spec_query::expr::{Expr, ParamId};
//!
//! let param = ParamId::fresh();
//! let body = Expr::param(param)
//!     .field("age")
//!     .ge(18)
//!     .and(Expr::param(param).field("name").call("starts_with", ["A"]));
//!
//! assert!(body.references(param));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::value::Value;

static NEXT_PARAM: AtomicU64 = AtomicU64::new(1);

/// Identity of a parameter placeholder ("the entity being tested")
///
/// Two placeholders are the same parameter iff their ids are equal. Fresh
/// ids are unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamId(u64);

impl ParamId {
    /// Allocate a parameter id no other placeholder uses
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_PARAM.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$p{}", self.0)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
        }
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    /// Short-circuit conjunction
    And,
    /// Short-circuit disjunction
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
        }
    }
}

/// A node of the predicate expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a parameter placeholder
    Param(ParamId),
    /// Constant value
    Literal(Value),
    /// Field access: `target.field`
    Member { target: Box<Expr>, field: String },
    /// Binary comparison
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Binary boolean connective
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Boolean negation
    Not(Box<Expr>),
    /// Binary arithmetic
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Method call on a value: `target.method(args..)`
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

/// Conversion into an expression operand
///
/// Implemented for [`Expr`] itself and for the primitive types that convert
/// into a [`Value`] literal.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::Literal(self)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(&str, String, i64, i32, u32, f64, bool);

impl<V: Into<Value>> IntoExpr for Vec<V> {
    fn into_expr(self) -> Expr {
        Expr::Literal(Value::from(self))
    }
}

impl<V: Into<Value>> IntoExpr for Option<V> {
    fn into_expr(self) -> Expr {
        Expr::Literal(Value::from(self))
    }
}

impl Expr {
    /// Reference to parameter `id`
    #[must_use]
    pub const fn param(id: ParamId) -> Self {
        Self::Param(id)
    }

    /// Constant value
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Access `field` on this expression
    #[must_use]
    pub fn field(self, field: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            field: field.into(),
        }
    }

    /// Access a dotted path, e.g. `"address.city"`
    #[must_use]
    pub fn path(self, path: &str) -> Self {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .fold(self, |expr, segment| expr.field(segment))
    }

    fn compare(self, op: CompareOp, rhs: impl IntoExpr) -> Self {
        Self::Compare {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into_expr()),
        }
    }

    #[must_use]
    pub fn eq(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::Equal, rhs)
    }

    #[must_use]
    pub fn ne(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::NotEqual, rhs)
    }

    #[must_use]
    pub fn gt(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::GreaterThan, rhs)
    }

    #[must_use]
    pub fn ge(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::GreaterThanOrEqual, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::LessThan, rhs)
    }

    #[must_use]
    pub fn le(self, rhs: impl IntoExpr) -> Self {
        self.compare(CompareOp::LessThanOrEqual, rhs)
    }

    /// `self IS NULL`
    #[must_use]
    pub fn is_null(self) -> Self {
        self.compare(CompareOp::Equal, Value::Null)
    }

    #[must_use]
    pub fn and(self, rhs: impl IntoExpr) -> Self {
        Self::Logical {
            op: LogicalOp::And,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into_expr()),
        }
    }

    #[must_use]
    pub fn or(self, rhs: impl IntoExpr) -> Self {
        Self::Logical {
            op: LogicalOp::Or,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into_expr()),
        }
    }

    /// Boolean negation
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    fn arith(self, op: ArithOp, rhs: impl IntoExpr) -> Self {
        Self::Arith {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into_expr()),
        }
    }

    #[must_use]
    pub fn plus(self, rhs: impl IntoExpr) -> Self {
        self.arith(ArithOp::Add, rhs)
    }

    #[must_use]
    pub fn minus(self, rhs: impl IntoExpr) -> Self {
        self.arith(ArithOp::Sub, rhs)
    }

    #[must_use]
    pub fn times(self, rhs: impl IntoExpr) -> Self {
        self.arith(ArithOp::Mul, rhs)
    }

    #[must_use]
    pub fn divided_by(self, rhs: impl IntoExpr) -> Self {
        self.arith(ArithOp::Div, rhs)
    }

    /// Method call on this expression
    #[must_use]
    pub fn call<A, I>(self, method: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: IntoExpr,
    {
        Self::Call {
            target: Box::new(self),
            method: method.into(),
            args: args.into_iter().map(IntoExpr::into_expr).collect(),
        }
    }

    /// Direct children of this node, left to right
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Param(_) | Self::Literal(_) => Vec::new(),
            Self::Member { target, .. } => vec![target.as_ref()],
            Self::Not(inner) => vec![inner.as_ref()],
            Self::Compare { lhs, rhs, .. }
            | Self::Logical { lhs, rhs, .. }
            | Self::Arith { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Self::Call { target, args, .. } => {
                let mut children = Vec::with_capacity(args.len() + 1);
                children.push(target.as_ref());
                children.extend(args.iter());
                children
            }
        }
    }

    /// Every parameter referenced anywhere in the tree
    #[must_use]
    pub fn parameters(&self) -> BTreeSet<ParamId> {
        let mut found = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Self::Param(id) = node {
                found.insert(*id);
            }
            stack.extend(node.children());
        }
        found
    }

    /// Whether the tree references parameter `id`
    #[must_use]
    pub fn references(&self, id: ParamId) -> bool {
        self.parameters().contains(&id)
    }

    /// Number of nodes in the tree
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(id) => write!(f, "{}", id),
            Self::Literal(value) => write!(f, "{}", value),
            Self::Member { target, field } => write!(f, "{}.{}", target, field),
            Self::Compare { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Self::Logical { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Self::Not(inner) => write!(f, "NOT {}", inner),
            Self::Arith { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Self::Call {
                target,
                method,
                args,
            } => {
                write!(f, "{}.{}(", target, method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_params_are_distinct() {
        let a = ParamId::fresh();
        let b = ParamId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn test_builder_shapes() {
        let p = ParamId::fresh();
        let expr = Expr::param(p).field("age").ge(18);
        match expr {
            Expr::Compare { op, lhs, rhs } => {
                assert_eq!(op, CompareOp::GreaterThanOrEqual);
                assert_eq!(*rhs, Expr::Literal(Value::Int(18)));
                assert!(matches!(*lhs, Expr::Member { ref field, .. } if field == "age"));
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_path_splits_segments() {
        let p = ParamId::fresh();
        let expr = Expr::param(p).path("address.city");
        assert_eq!(expr, Expr::param(p).field("address").field("city"));
    }

    #[test]
    fn test_parameters_walks_nested_nodes() {
        let a = ParamId::fresh();
        let b = ParamId::fresh();
        let expr = Expr::param(a)
            .field("name")
            .call("starts_with", [Expr::param(b).field("prefix")])
            .and(!Expr::param(a).field("deleted").eq(true));

        let params = expr.parameters();
        assert_eq!(params.len(), 2);
        assert!(expr.references(a));
        assert!(expr.references(b));
        assert!(!expr.references(ParamId::fresh()));
    }

    #[test]
    fn test_node_count() {
        let p = ParamId::fresh();
        // Compare(Member(Param), Literal) = 4 nodes
        assert_eq!(Expr::param(p).field("id").eq(1).node_count(), 4);
    }

    #[test]
    fn test_display() {
        let p = ParamId::fresh();
        let expr = Expr::param(p).field("age").plus(1).gt(21);
        assert_eq!(expr.to_string(), format!("(({}.age + 1) > 21)", p));
    }
}
