//! Persistence capability.
//!
//! The console never talks to a database engine directly. It consumes
//! this capability:
//!
//! ```text
//! Persistence
//!   ├── ambient()                  caller's own connection (normal runs)
//!   ├── new_isolated_connection()  fresh connection (profiling)
//!   └── open_scoped_checkpoint()   isolated connection + savepoint (safe mode)
//!
//! Connection
//!   ├── execute(Operation) -> OperationResult
//!   └── savepoint / rollback_to / release / commit / rollback / close
//! ```
//!
//! Safe mode and profiling never use the ambient connection: rolling back
//! there would also discard the caller's own pending work.

mod checkpoint;
mod error;
mod memory;
mod operation;
mod recording;

pub use checkpoint::Checkpoint;
pub use error::PersistenceError;
pub use memory::{MemoryConnection, MemoryPersistence};
pub use operation::{Filter, Operation, OperationResult, Record};
pub use recording::RecordingConnection;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A transactional connection.
///
/// Implementations use interior mutability; a connection is shared between
/// the engine and the script-facing handles for the duration of a run.
pub trait Connection: Send + Sync {
    /// Runs one data operation inside the current transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the operation is invalid or the
    /// connection is closed.
    fn execute(&self, operation: &Operation) -> Result<OperationResult, PersistenceError>;

    /// Creates a named savepoint.
    fn savepoint(&self, name: &str) -> Result<(), PersistenceError>;

    /// Undoes everything since the named savepoint. The savepoint is kept.
    fn rollback_to(&self, name: &str) -> Result<(), PersistenceError>;

    /// Forgets the named savepoint, keeping its changes.
    fn release(&self, name: &str) -> Result<(), PersistenceError>;

    fn commit(&self) -> Result<(), PersistenceError>;

    fn rollback(&self) -> Result<(), PersistenceError>;

    /// Closes the connection. Further calls fail with
    /// [`PersistenceError::Closed`]. Closing twice is a no-op.
    fn close(&self) -> Result<(), PersistenceError>;
}

/// Source of connections.
pub trait Persistence: Send + Sync {
    /// The caller's ambient connection.
    fn ambient(&self) -> Arc<dyn Connection>;

    /// Opens a connection isolated from the ambient one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if no connection can be opened.
    fn new_isolated_connection(&self) -> Result<Arc<dyn Connection>, PersistenceError>;

    /// Opens an isolated connection and sets a savepoint on it.
    ///
    /// The returned guard rolls everything back when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the connection or savepoint fails.
    fn open_scoped_checkpoint(&self) -> Result<Checkpoint, PersistenceError> {
        let connection = self.new_isolated_connection()?;
        let name = next_savepoint_name();
        connection.savepoint(&name)?;
        Ok(Checkpoint::new(connection, name))
    }
}

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_savepoint_name() -> String {
    format!("webshell_sp_{}", SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed))
}
