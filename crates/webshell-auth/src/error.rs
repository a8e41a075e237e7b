//! Policy gate errors.

use thiserror::Error;
use webshell_types::OperatorId;

/// The operator lacks the privileged role.
///
/// Terminal: no output, no side effects, nothing executed.
///
/// # Example
///
/// ```
/// use webshell_auth::AccessDenied;
/// use webshell_types::OperatorId;
///
/// let err = AccessDenied::new(OperatorId::new(9), "guest");
/// assert!(err.to_string().contains("guest"));
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("access denied: '{login}' ({operator}) is not a system administrator")]
pub struct AccessDenied {
    pub operator: OperatorId,
    pub login: String,
}

impl AccessDenied {
    #[must_use]
    pub fn new(operator: OperatorId, login: impl Into<String>) -> Self {
        Self {
            operator,
            login: login.into(),
        }
    }
}

/// Any rejection produced by the [`PolicyGate`](crate::PolicyGate).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Operator is not privileged.
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    /// Code contains a blocklisted pattern.
    #[error("blocked command: '{pattern}' is not allowed (configurable via 'execution.blocked_patterns')")]
    BlockedPattern { pattern: String },
}

impl PolicyError {
    /// Short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "access_denied",
            Self::BlockedPattern { .. } => "blocked_pattern",
        }
    }
}
