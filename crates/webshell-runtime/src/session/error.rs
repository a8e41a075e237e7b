//! Session store errors.

use thiserror::Error;
use webshell_types::OperatorId;

/// Errors raised by the [`SessionStore`](super::SessionStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A namespace entry would shadow a reserved binding.
    #[error("'{name}' is a reserved name and cannot be stored in a session")]
    ReservedName { name: String },

    /// The session factory could not build a new session.
    #[error("failed to initialise session for {operator}: {reason}")]
    Init { operator: OperatorId, reason: String },
}

impl SessionError {
    pub fn reserved(name: impl Into<String>) -> Self {
        Self::ReservedName { name: name.into() }
    }

    pub fn init(operator: OperatorId, reason: impl Into<String>) -> Self {
        Self::Init {
            operator,
            reason: reason.into(),
        }
    }
}
