//! Console error types.
//!
//! Only three failures cross the console boundary as distinct errors:
//! [`AccessDenied`](ConsoleError::AccessDenied),
//! [`BlockedPattern`](ConsoleError::BlockedPattern) and
//! [`DeadlineExceeded`](ConsoleError::DeadlineExceeded). Runtime faults in
//! the submitted code are flattened into the returned output text.
//! [`Internal`](ConsoleError::Internal) covers host-side failures that no
//! snippet can cause.

use std::time::Duration;
use thiserror::Error;
use webshell_auth::{AccessDenied, PolicyError};
use webshell_runtime::{PersistenceError, SessionError};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error("blocked pattern: '{pattern}' is not allowed (configurable via execution.blocked_patterns)")]
    BlockedPattern { pattern: String },

    #[error("execution exceeded the time limit ({}s); configurable via execution.timeout", .budget.as_secs())]
    DeadlineExceeded { budget: Duration },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "access_denied",
            Self::BlockedPattern { .. } => "blocked_pattern",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<PolicyError> for ConsoleError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::AccessDenied(denied) => Self::AccessDenied(denied),
            PolicyError::BlockedPattern { pattern } => Self::BlockedPattern { pattern },
        }
    }
}

impl From<SessionError> for ConsoleError {
    fn from(err: SessionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<PersistenceError> for ConsoleError {
    fn from(err: PersistenceError) -> Self {
        Self::Internal(format!("persistence: {err}"))
    }
}

impl From<mlua::Error> for ConsoleError {
    fn from(err: mlua::Error) -> Self {
        Self::Internal(format!("interpreter: {err}"))
    }
}
