//! Crate-level error type
//!
//! Repository calls return the structured [`RepositoryError`]; [`Error`] is
//! the umbrella for application code that loads configuration, installs
//! tracing and talks to repositories in one place.

use thiserror::Error;

use crate::expr::EvalError;
use crate::repository::RepositoryError;
use crate::store::StoreError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured repository error with operation context
    #[error("{0}")]
    Repository(RepositoryError),

    /// Store failure outside a repository call
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Predicate evaluation failure outside a store
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        Error::Repository(err)
    }
}

impl Error {
    /// Transient failure that may succeed when repeated
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Repository(err) => err.is_retriable(),
            Error::Store(err) => err.is_retriable(),
            _ => false,
        }
    }
}
