//! Scoped, always-reverted checkpoint.

use super::{Connection, PersistenceError};
use std::sync::Arc;
use tracing::{debug, error};

/// A savepoint on an isolated connection that is undone when the guard
/// goes away.
///
/// Dropping the guard rolls back to the savepoint, rolls back the
/// connection's transaction and closes it, on every exit path including
/// unwinding. [`rollback`](Self::rollback) does the same eagerly and
/// reports errors.
pub struct Checkpoint {
    connection: Arc<dyn Connection>,
    name: String,
    finished: bool,
}

impl Checkpoint {
    pub(crate) fn new(connection: Arc<dyn Connection>, name: String) -> Self {
        debug!(savepoint = %name, "checkpoint opened");
        Self {
            connection,
            name,
            finished: false,
        }
    }

    /// Connection all checkpointed work must go through.
    #[must_use]
    pub fn connection(&self) -> Arc<dyn Connection> {
        Arc::clone(&self.connection)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reverts and closes now.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; the connection is still closed.
    pub fn rollback(mut self) -> Result<(), PersistenceError> {
        self.finished = true;
        self.revert()
    }

    fn revert(&self) -> Result<(), PersistenceError> {
        let to_savepoint = self.connection.rollback_to(&self.name);
        let whole = self.connection.rollback();
        let close = self.connection.close();
        debug!(savepoint = %self.name, "checkpoint rolled back");
        to_savepoint.and(whole).and(close)
    }
}

impl Drop for Checkpoint {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.revert() {
            error!(savepoint = %self.name, error = %e, "checkpoint rollback failed");
        }
    }
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("name", &self.name)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
