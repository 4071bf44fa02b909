//! Unit of work over a data store

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Change, CommitReceipt, DataStore, Document, FetchMode, StoreResult};
use crate::query::QueryPlan;

/// Stages changes and commits them to a store as one atomic batch
///
/// A session is cheap to share behind an `Arc`, but it is meant to be driven
/// by one logical caller at a time: staged changes from overlapping callers
/// would be committed together.
///
/// # Example
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), spec_query::store::StoreError> {
/// use std::sync::Arc;
/// use serde_json::json;
/// use spec_query::store::{Change, MemoryStore, Session};
///
/// let session = Session::new(Arc::new(MemoryStore::new()));
/// session.stage(Change::insert("notes", json!({"id": null, "text": "hi"}))).await;
/// session.stage(Change::insert("notes", json!({"id": null, "text": "yo"}))).await;
///
/// let receipt = session.save_changes().await?;
/// assert_eq!(receipt.inserted.len(), 2);
/// assert_eq!(session.pending().await, 0);
/// # Ok(())
/// # }
/// ```
pub struct Session {
    store: Arc<dyn DataStore>,
    staged: Mutex<Vec<Change>>,
}

impl Session {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            staged: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// Record a change to apply on the next [`save_changes`](Self::save_changes)
    pub async fn stage(&self, change: Change) {
        self.staged.lock().await.push(change);
    }

    /// Number of staged, uncommitted changes
    pub async fn pending(&self) -> usize {
        self.staged.lock().await.len()
    }

    /// Drop all staged changes without committing, returning how many there were
    pub async fn discard(&self) -> usize {
        let mut staged = self.staged.lock().await;
        let count = staged.len();
        staged.clear();
        count
    }

    /// Commit every staged change atomically
    ///
    /// The staged list is drained before the commit is attempted, so after a
    /// failure the session is empty and the store is unchanged.
    pub async fn save_changes(&self) -> StoreResult<CommitReceipt> {
        let changes = std::mem::take(&mut *self.staged.lock().await);
        if changes.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let count = changes.len();
        debug!(changes = count, "Committing unit of work");
        match self.store.commit(changes).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                warn!(changes = count, error = %e, "Commit failed, staged changes discarded");
                Err(e)
            }
        }
    }

    pub async fn fetch(&self, plan: &QueryPlan, mode: FetchMode) -> StoreResult<Vec<Document>> {
        self.store.fetch(plan, mode).await
    }

    pub async fn count(&self, plan: &QueryPlan) -> StoreResult<u64> {
        self.store.count(plan).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_save_is_noop() {
        let session = Session::new(Arc::new(MemoryStore::new()));
        let receipt = session.save_changes().await.unwrap();
        assert_eq!(receipt, CommitReceipt::default());
    }

    #[tokio::test]
    async fn test_failed_save_discards_staged_changes() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone());

        session
            .stage(Change::insert("tags", json!({"id": null, "label": "a"})))
            .await;
        session.stage(Change::delete("tags", 99)).await;

        let err = session.save_changes().await.unwrap_err();
        assert!(matches!(err, StoreError::ConcurrencyConflict(_)));
        assert_eq!(session.pending().await, 0);
        assert_eq!(store.document_count("tags").await, 0);
    }

    #[tokio::test]
    async fn test_discard() {
        let session = Session::new(Arc::new(MemoryStore::new()));
        session.stage(Change::delete("tags", 1)).await;
        session.stage(Change::delete("tags", 2)).await;
        assert_eq!(session.discard().await, 2);
        assert_eq!(session.pending().await, 0);
    }
}
