//! Authorization capability.
//!
//! [`AuthCapability`] is the seam to the host's identity system. The gate
//! only asks one question of it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use webshell_types::Operator;

/// Answers whether an operator holds the privileged (system administrator)
/// role.
///
/// # Example
///
/// ```
/// use webshell_auth::AuthCapability;
/// use webshell_types::Operator;
///
/// struct Everyone;
///
/// impl AuthCapability for Everyone {
///     fn has_privileged_role(&self, _operator: &Operator) -> bool {
///         true
///     }
/// }
///
/// assert!(Everyone.has_privileged_role(&Operator::new(1, "admin")));
/// ```
pub trait AuthCapability: Send + Sync {
    fn has_privileged_role(&self, operator: &Operator) -> bool;
}

/// Static role table: an operator is privileged if its id or its login is
/// listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    logins: BTreeSet<String>,
    ids: BTreeSet<u64>,
}

impl RoleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants the privileged role to a login.
    #[must_use]
    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.logins.insert(login.into());
        self
    }

    /// Grants the privileged role to an operator id.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.ids.insert(id);
        self
    }

    /// Builds a table from configuration lists.
    #[must_use]
    pub fn from_lists(
        logins: impl IntoIterator<Item = impl Into<String>>,
        ids: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            logins: logins.into_iter().map(Into::into).collect(),
            ids: ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logins.is_empty() && self.ids.is_empty()
    }
}

impl AuthCapability for RoleTable {
    fn has_privileged_role(&self, operator: &Operator) -> bool {
        self.ids.contains(&operator.id.get()) || self.logins.contains(&operator.login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_grants_role() {
        let table = RoleTable::new().with_login("admin");
        assert!(table.has_privileged_role(&Operator::new(99, "admin")));
        assert!(!table.has_privileged_role(&Operator::new(99, "demo")));
    }

    #[test]
    fn id_grants_role() {
        let table = RoleTable::new().with_id(2);
        assert!(table.has_privileged_role(&Operator::new(2, "whoever")));
        assert!(!table.has_privileged_role(&Operator::new(3, "whoever")));
    }

    #[test]
    fn empty_table_denies_everyone() {
        let table = RoleTable::new();
        assert!(table.is_empty());
        assert!(!table.has_privileged_role(&Operator::new(1, "admin")));
    }
}
