//! Repository error types
//!
//! Store failures reach callers as a [`RepositoryError`] that records which
//! repository operation failed, for which entity, and the store's message
//! unchanged.
//!
//! # Example
//!
//! ```rust
//! use spec_query::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//! use spec_query::store::StoreError;
//!
//! let error = RepositoryError::from_store(
//!     RepositoryOperation::Add,
//!     StoreError::ConstraintViolation("users with id 7 already exists".into()),
//! )
//! .with_entity("User", "7");
//!
//! assert_eq!(error.kind, RepositoryErrorKind::ConstraintViolation);
//! assert_eq!(error.message, "users with id 7 already exists");
//! assert!(!error.is_retriable());
//! ```

use std::fmt;

use crate::store::StoreError;

/// Repository operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    ListAll,
    List,
    FirstOrDefault,
    Count,
    Add,
    Update,
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListAll => write!(f, "list_all"),
            Self::List => write!(f, "list"),
            Self::FirstOrDefault => write!(f, "first_or_default"),
            Self::Count => write!(f, "count"),
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// The store could not translate or execute the query
    TranslationFailed,
    /// Uniqueness or key constraint rejected the change
    ConstraintViolation,
    /// The targeted record no longer exists in the expected state
    ConcurrencyConflict,
    /// Failed to reach the store
    ConnectionFailed,
    /// Entity could not be converted to or from its stored form
    SerializationError,
    /// The entity is not in a state the operation accepts
    ValidationFailed,
    /// The operation was abandoned before completing
    Cancelled,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TranslationFailed => write!(f, "translation_failed"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConcurrencyConflict => write!(f, "concurrency_conflict"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Wrap a store failure, keeping its message verbatim
    pub fn from_store(operation: RepositoryOperation, err: StoreError) -> Self {
        let (kind, message) = match err {
            StoreError::Translation(msg) => (RepositoryErrorKind::TranslationFailed, msg),
            StoreError::ConstraintViolation(msg) => {
                (RepositoryErrorKind::ConstraintViolation, msg)
            }
            StoreError::ConcurrencyConflict(msg) => {
                (RepositoryErrorKind::ConcurrencyConflict, msg)
            }
            StoreError::ConnectionFailed(msg) => (RepositoryErrorKind::ConnectionFailed, msg),
            StoreError::Serialization(msg) => (RepositoryErrorKind::SerializationError, msg),
            StoreError::Cancelled => (
                RepositoryErrorKind::Cancelled,
                StoreError::Cancelled.to_string(),
            ),
        };
        Self::new(operation, kind, message)
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Add entity type context to an existing error
    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    ///
    /// Nothing in this crate retries; the flag is for callers.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::ConcurrencyConflict
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        match (&self.entity_type, &self.entity_id) {
            (Some(entity_type), Some(entity_id)) => write!(f, " [{}: {}]", entity_type, entity_id),
            (Some(entity_type), None) => write!(f, " [{}]", entity_type),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::ListAll), "list_all");
        assert_eq!(format!("{}", RepositoryOperation::List), "list");
        assert_eq!(
            format!("{}", RepositoryOperation::FirstOrDefault),
            "first_or_default"
        );
        assert_eq!(format!("{}", RepositoryOperation::Count), "count");
        assert_eq!(format!("{}", RepositoryOperation::Add), "add");
        assert_eq!(format!("{}", RepositoryOperation::Update), "update");
        assert_eq!(format!("{}", RepositoryOperation::Delete), "delete");
    }

    #[test]
    fn test_kind_derived_from_store_error() {
        let cases = [
            (
                StoreError::Translation("x".into()),
                RepositoryErrorKind::TranslationFailed,
            ),
            (
                StoreError::ConstraintViolation("x".into()),
                RepositoryErrorKind::ConstraintViolation,
            ),
            (
                StoreError::ConcurrencyConflict("x".into()),
                RepositoryErrorKind::ConcurrencyConflict,
            ),
            (
                StoreError::ConnectionFailed("x".into()),
                RepositoryErrorKind::ConnectionFailed,
            ),
            (
                StoreError::Serialization("x".into()),
                RepositoryErrorKind::SerializationError,
            ),
            (StoreError::Cancelled, RepositoryErrorKind::Cancelled),
        ];
        for (store_error, kind) in cases {
            let error = RepositoryError::from_store(RepositoryOperation::List, store_error);
            assert_eq!(error.kind, kind);
            assert_eq!(error.operation, RepositoryOperation::List);
        }
    }

    #[test]
    fn test_store_message_is_verbatim() {
        let error = RepositoryError::from_store(
            RepositoryOperation::Update,
            StoreError::ConcurrencyConflict("orders with id 3 does not exist".into()),
        );
        assert_eq!(error.message, "orders with id 3 does not exist");
    }

    #[test]
    fn test_is_retriable() {
        let transient =
            RepositoryError::from_store(RepositoryOperation::List, StoreError::ConnectionFailed("reset".into()));
        assert!(transient.is_retriable());

        let permanent = RepositoryError::validation_failed(RepositoryOperation::Update, "no id");
        assert!(!permanent.is_retriable());
        assert!(
            !RepositoryError::serialization_error(RepositoryOperation::List, "json").is_retriable()
        );
    }

    #[test]
    fn test_display_with_entity() {
        let error = RepositoryError::validation_failed(RepositoryOperation::Delete, "missing id")
            .with_entity("Order", "ord_9");
        let display = format!("{}", error);
        assert!(display.contains("validation_failed"));
        assert!(display.contains("delete"));
        assert!(display.contains("[Order: ord_9]"));
    }

    #[test]
    fn test_display_with_entity_type_only() {
        let error = RepositoryError::new(
            RepositoryOperation::List,
            RepositoryErrorKind::TranslationFailed,
            "bad plan",
        )
        .with_entity_type("Order");
        assert!(format!("{}", error).ends_with("bad plan [Order]"));
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: Box<dyn std::error::Error> = Box::new(RepositoryError::new(
            RepositoryOperation::Add,
            RepositoryErrorKind::Other,
            "boom",
        ));
        assert!(error.to_string().contains("other"));
    }
}
