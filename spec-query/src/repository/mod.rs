//! Generic repositories driven by specifications
//!
//! A repository answers reads with a [`Specification`](crate::specification::Specification)
//! and commits each write as its own unit of work.
//!
//! # Overview
//!
//! - [`Entity`]: record types a repository persists
//! - [`Repository`]: the CRUD surface (`list_all`, `list`, `first_or_default`,
//!   `count`, `add`, `update`, `delete`)
//! - [`SpecRepository`]: the implementation over a [`Session`](crate::store::Session)
//! - [`RepositoryError`]: structured failures with operation and entity context

mod error;
mod spec_repository;
mod traits;

// Re-export all public types
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use spec_repository::SpecRepository;
pub use traits::{Entity, Repository, RepositoryResult};
