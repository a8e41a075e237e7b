//! Operator identity.
//!
//! Identity comes from an external auth collaborator; webshell never
//! authenticates. The id is opaque and only used as a key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque operator identifier as issued by the auth collaborator.
///
/// # Example
///
/// ```
/// use webshell_types::OperatorId;
///
/// let id = OperatorId::new(2);
/// assert_eq!(id.get(), 2);
/// assert_eq!(id.to_string(), "operator:2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(u64);

impl OperatorId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operator:{}", self.0)
    }
}

impl From<u64> for OperatorId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// An authenticated operator: id plus login.
///
/// Two operators are the same operator iff their ids match; the login is
/// carried for audit records and display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    /// Session and authorization key.
    pub id: OperatorId,
    /// Human-readable login.
    pub login: String,
}

impl Operator {
    /// Creates an operator identity.
    #[must_use]
    pub fn new(id: u64, login: impl Into<String>) -> Self {
        Self {
            id: OperatorId::new(id),
            login: login.into(),
        }
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Operator {}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.login, self.id)
    }
}
