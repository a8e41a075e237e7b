//! Per-operator Session Store.
//!
//! Each operator id owns one session: the operator's interpreter state plus
//! its variable [`Namespace`]. Sessions live for the lifetime of the process
//! and are never expired.
//!
//! # Concurrency
//!
//! Sessions sit behind their own mutex:
//!
//! ```text
//! SessionStore
//!   RwLock<HashMap<OperatorId, Arc<Mutex<S>>>>
//!        │ read lock: lookup
//!        │ write lock: first access / clear / reset
//!        ▼
//!   Arc<Mutex<S>>  ← held for a whole fetch → run → persist cycle
//! ```
//!
//! Two requests from the same operator are serialized; requests from
//! different operators never contend beyond the brief map lookup.
//!
//! # Process-local
//!
//! Nothing here is shared between processes. In a multi-worker deployment
//! an operator sees whichever worker's namespace served the request.

mod error;
mod namespace;
mod store;

pub use error::SessionError;
pub use namespace::Namespace;
pub use store::{SessionState, SessionStore};
