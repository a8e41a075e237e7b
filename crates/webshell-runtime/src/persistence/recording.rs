//! Query-recording connection decorator used for profiling.

use super::{Connection, Operation, OperationResult, PersistenceError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use webshell_types::QueryRecord;

/// Wraps a connection and records every [`execute`](Connection::execute)
/// call with its SQL-like text and duration.
///
/// Failed operations are recorded too; they were issued.
pub struct RecordingConnection {
    inner: Arc<dyn Connection>,
    queries: Mutex<Vec<QueryRecord>>,
}

impl RecordingConnection {
    #[must_use]
    pub fn new(inner: Arc<dyn Connection>) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Recorded queries so far, in issue order.
    #[must_use]
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.queries.lock().clone()
    }

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

impl Connection for RecordingConnection {
    fn execute(&self, operation: &Operation) -> Result<OperationResult, PersistenceError> {
        let started = Instant::now();
        let result = self.inner.execute(operation);
        let time = started.elapsed().as_secs_f64() * 1000.0;
        self.queries.lock().push(QueryRecord {
            sql: operation.to_string(),
            time,
        });
        result
    }

    fn savepoint(&self, name: &str) -> Result<(), PersistenceError> {
        self.inner.savepoint(name)
    }

    fn rollback_to(&self, name: &str) -> Result<(), PersistenceError> {
        self.inner.rollback_to(name)
    }

    fn release(&self, name: &str) -> Result<(), PersistenceError> {
        self.inner.release(name)
    }

    fn commit(&self) -> Result<(), PersistenceError> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<(), PersistenceError> {
        self.inner.rollback()
    }

    fn close(&self) -> Result<(), PersistenceError> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryPersistence, Persistence};
    use serde_json::Map;

    #[test]
    fn records_each_operation() {
        let db = MemoryPersistence::new();
        let conn = RecordingConnection::new(db.new_isolated_connection().expect("open"));

        conn.execute(&Operation::Count {
            model: "res.partner".into(),
            filter: Map::new(),
        })
        .expect("count");
        let _ = conn.execute(&Operation::Count {
            model: "bad model".into(),
            filter: Map::new(),
        });

        let queries = conn.queries();
        assert_eq!(conn.query_count(), 2);
        assert_eq!(queries[0].sql, r#"SELECT COUNT(*) FROM "res_partner""#);
        assert!(queries[0].time >= 0.0);
    }
}
