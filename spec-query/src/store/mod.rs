//! Storage collaborators
//!
//! A [`DataStore`] executes query plans and applies batches of changes
//! atomically. Repositories never talk to a store directly: they go through
//! a [`Session`], which stages changes until `save_changes` commits them as
//! one unit of work.
//!
//! [`MemoryStore`] is a complete in-process implementation, used by the test
//! suite and suitable for prototypes.

#[cfg(feature = "memory-store")]
mod memory;
mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::EvalError;
use crate::query::QueryPlan;

#[cfg(feature = "memory-store")]
pub use memory::{MemoryStore, Relation};
pub use session::Session;

/// A persisted record in its serialized form
pub type Document = serde_json::Value;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a store
///
/// Messages are preserved verbatim by the repository layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The plan could not be translated or executed by the store
    #[error("query translation failed: {0}")]
    Translation(String),

    /// A uniqueness or key constraint rejected the change set
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A change targeted a record that no longer exists in the expected state
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Transient failures that may succeed when attempted again
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::ConcurrencyConflict(_))
    }
}

impl From<EvalError> for StoreError {
    fn from(err: EvalError) -> Self {
        Self::Translation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// How many rows of a plan's result to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    All,
    /// At most one row, the first of the plan's result
    First,
}

/// One staged modification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Add a document; a null or missing `id` is assigned by the store
    Insert {
        collection: String,
        document: Document,
    },
    /// Replace the document stored under `id`
    Update {
        collection: String,
        id: u64,
        document: Document,
    },
    Delete {
        collection: String,
        id: u64,
    },
}

impl Change {
    pub fn insert(collection: impl Into<String>, document: Document) -> Self {
        Self::Insert {
            collection: collection.into(),
            document,
        }
    }

    pub fn update(collection: impl Into<String>, id: u64, document: Document) -> Self {
        Self::Update {
            collection: collection.into(),
            id,
            document,
        }
    }

    pub fn delete(collection: impl Into<String>, id: u64) -> Self {
        Self::Delete {
            collection: collection.into(),
            id,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Insert { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReceipt {
    /// Inserted documents with their assigned ids, in staging order
    pub inserted: Vec<Document>,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitReceipt {
    /// Total number of changes applied
    #[must_use]
    pub fn affected(&self) -> usize {
        self.inserted.len() + self.updated + self.deleted
    }
}

/// Backend that executes query plans and commits change sets
///
/// Implementations translate a [`QueryPlan`] into their own query language.
/// Anything they cannot express is a [`StoreError::Translation`], reported
/// when the plan is fetched.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Materialize the rows described by `plan`
    async fn fetch(&self, plan: &QueryPlan, mode: FetchMode) -> StoreResult<Vec<Document>>;

    /// Number of rows `plan` yields
    async fn count(&self, plan: &QueryPlan) -> StoreResult<u64> {
        let rows = self.fetch(plan, FetchMode::All).await?;
        Ok(rows.len() as u64)
    }

    /// Apply every change or none of them
    async fn commit(&self, changes: Vec<Change>) -> StoreResult<CommitReceipt>;
}
