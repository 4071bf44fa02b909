//! Repository trait definitions
//!
//! [`Repository`] uses return-position `impl Trait` in traits, so
//! implementations write plain `async fn` methods.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::RepositoryError;
use crate::specification::Specification;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// A record type a repository can persist
///
/// The storage-assigned identifier lives in the serialized field `id`. New
/// entities serialize it as `null` (or omit it); the store fills it in.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use spec_query::repository::Entity;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Customer {
///     id: Option<u64>,
///     name: String,
/// }
///
/// impl Entity for Customer {
///     const COLLECTION: &'static str = "customers";
///
///     fn id(&self) -> Option<u64> {
///         self.id
///     }
/// }
///
/// assert_eq!(Customer::entity_name(), "Customer");
/// ```
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection the entity is stored in
    const COLLECTION: &'static str;

    /// Storage-assigned identifier, `None` before the first save
    fn id(&self) -> Option<u64>;

    /// Short type name used in errors and logs
    fn entity_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Generic data access over one entity type
///
/// Reads take a [`Specification`]; writes are each committed as their own
/// unit of work before the call returns.
pub trait Repository<T: Entity>: Send + Sync {
    /// Every stored entity in store-default order
    fn list_all(&self) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;

    /// Entities selected by `spec`
    fn list(
        &self,
        spec: &Specification<T>,
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;

    /// The first entity selected by `spec`, or `None` when nothing matches
    fn first_or_default(
        &self,
        spec: &Specification<T>,
    ) -> impl Future<Output = RepositoryResult<Option<T>>> + Send;

    /// Number of entities `spec` selects, window included
    fn count(&self, spec: &Specification<T>)
        -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Persist a new entity and return it with its assigned id
    fn add(&self, entity: T) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Replace the stored state of an existing entity
    fn update(&self, entity: &T) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Remove an existing entity
    fn delete(&self, entity: &T) -> impl Future<Output = RepositoryResult<()>> + Send;
}
