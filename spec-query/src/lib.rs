//! # spec-query
//!
//! Composable query specifications with a generic async repository.
//!
//! ## Features
//!
//! - **Predicates**: typed boolean expressions over an entity that combine
//!   with `and_also` / `or_else` into a single-parameter expression tree
//! - **Specifications**: criteria, eager-loaded includes, multi-key ordering
//!   and a skip/take window, frozen once built
//! - **Evaluator**: applies a specification to any query source in a fixed
//!   order and yields an inspectable query plan
//! - **Repository**: `list_all`, `list`, `first_or_default`, `count`, `add`,
//!   `update` and `delete` over a unit-of-work session
//! - **Memory store**: an in-process store with relations, uniqueness and
//!   atomic commits (`memory-store` feature, on by default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde::{Deserialize, Serialize};
//! use spec_query::prelude::*;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Customer {
//!     id: Option<u64>,
//!     name: String,
//!     active: bool,
//! }
//!
//! impl Entity for Customer {
//!     const COLLECTION: &'static str = "customers";
//!
//!     fn id(&self) -> Option<u64> {
//!         self.id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let session = Arc::new(Session::new(Arc::new(MemoryStore::new())));
//!     let customers = SpecRepository::<Customer>::new(session).with_config(&config.repository);
//!
//!     customers
//!         .add(Customer { id: None, name: "Ada".into(), active: true })
//!         .await?;
//!
//!     let active = Specification::define(|b| {
//!         b.add_criteria(Predicate::new(|c| c.field("active").eq(true)))
//!             .apply_order_by(Ordering::asc(|c| c.field("name")))
//!     });
//!     let found = customers.list(&active).await?;
//!     assert_eq!(found.len(), 1);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod observability;
pub mod query;
pub mod repository;
pub mod specification;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, RepositoryConfig, ServiceConfig};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{evaluate, DefaultEvaluator, SpecificationEvaluator};
    pub use crate::expr::{Expr, IntoExpr, Predicate, Value};
    pub use crate::observability::init_tracing;
    pub use crate::query::{Query, QueryPlan, Queryable};
    pub use crate::repository::{
        Entity, Repository, RepositoryError, RepositoryErrorKind, RepositoryOperation,
        RepositoryResult, SpecRepository,
    };
    pub use crate::specification::{
        Include, Ordering, Pagination, SortDirection, SortKey, Specification,
        SpecificationBuilder,
    };
    pub use crate::store::{
        Change, CommitReceipt, DataStore, FetchMode, Session, StoreError, StoreResult,
    };

    #[cfg(feature = "memory-store")]
    pub use crate::store::{MemoryStore, Relation};
}
