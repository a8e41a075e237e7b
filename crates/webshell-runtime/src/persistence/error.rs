//! Persistence errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// The connection was closed.
    #[error("connection is closed")]
    Closed,

    /// No savepoint with this name exists.
    #[error("unknown savepoint '{0}'")]
    UnknownSavepoint(String),

    /// The operation is malformed (bad model name, non-object values, ...).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The backend failed.
    #[error("backend error: {0}")]
    Backend(String),
}
