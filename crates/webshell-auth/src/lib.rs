//! Policy gate for webshell.
//!
//! Two checks guard every submission, always in this order and always
//! before any side effect:
//!
//! ```text
//! operator ──► AuthCapability::has_privileged_role ──► AccessDenied
//!                     │ ok
//!                     ▼
//! code ─────► Blocklist::first_match ─────────────────► BlockedPattern(pattern)
//!                     │ ok
//!                     ▼
//!                 execution
//! ```
//!
//! # Design Principles
//!
//! - **Trait here, implementation by the host**: [`AuthCapability`] is how
//!   the host application answers "is this operator privileged?".
//!   [`RoleTable`] is a static implementation for the CLI and tests.
//! - **Literal matching**: blocklist patterns are plain substrings, not
//!   regexes. A pattern either occurs in the code or it does not.

pub mod blocklist;
pub mod capability;
pub mod error;
pub mod gate;

pub use blocklist::{Blocklist, DEFAULT_BLOCKED_PATTERNS};
pub use capability::{AuthCapability, RoleTable};
pub use error::{AccessDenied, PolicyError};
pub use gate::PolicyGate;
