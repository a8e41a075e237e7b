//! The policy gate.

use crate::{AccessDenied, AuthCapability, Blocklist, PolicyError};
use std::sync::Arc;
use tracing::{debug, warn};
use webshell_types::Operator;

/// Authorization plus blocklist screening.
///
/// The gate is stateless apart from the auth capability; the blocklist is
/// passed per call so configuration changes apply immediately.
#[derive(Clone)]
pub struct PolicyGate {
    auth: Arc<dyn AuthCapability>,
}

impl PolicyGate {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthCapability>) -> Self {
        Self { auth }
    }

    /// Fails with [`AccessDenied`] unless the operator is privileged.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::AccessDenied`] for unprivileged operators.
    pub fn authorize(&self, operator: &Operator) -> Result<(), PolicyError> {
        if self.auth.has_privileged_role(operator) {
            debug!(operator = %operator.id, "operator authorized");
            Ok(())
        } else {
            warn!(operator = %operator.id, login = %operator.login, "access denied");
            Err(AccessDenied::new(operator.id, operator.login.clone()).into())
        }
    }

    /// Fails with `BlockedPattern` on the first blocklisted pattern in `code`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::BlockedPattern`] naming the matched pattern.
    pub fn screen(&self, code: &str, blocklist: &Blocklist) -> Result<(), PolicyError> {
        match blocklist.first_match(code) {
            Some(pattern) => {
                warn!(pattern = %pattern, "submission blocked");
                Err(PolicyError::BlockedPattern {
                    pattern: pattern.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGate").finish_non_exhaustive()
    }
}
