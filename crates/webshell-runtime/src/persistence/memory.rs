//! In-memory reference backend.
//!
//! Tables are JSON records keyed by id. Each connection copies the committed
//! state when its transaction begins and writes the whole state back on
//! commit (last committer wins). Savepoints are stacked snapshots.

use super::{Connection, Filter, Operation, OperationResult, PersistenceError, Record};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Record>,
}

type Tables = BTreeMap<String, Table>;

fn matches(record: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(k, v)| record.get(k) == Some(v))
}

fn validate_model(model: &str) -> Result<(), PersistenceError> {
    let valid = !model.is_empty()
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidOperation(format!(
            "invalid model name '{model}'"
        )))
    }
}

fn apply(tables: &mut Tables, operation: &Operation) -> Result<OperationResult, PersistenceError> {
    validate_model(operation.model())?;

    match operation {
        Operation::Create { model, values } => {
            let table = tables.entry(model.clone()).or_default();
            table.next_id += 1;
            let id = table.next_id;
            let mut record = values.clone();
            record.insert("id".into(), Value::from(id));
            table.rows.insert(id, record);
            Ok(OperationResult::Created(id))
        }
        Operation::Read { model, ids } => {
            let records = tables
                .get(model)
                .map(|t| ids.iter().filter_map(|id| t.rows.get(id).cloned()).collect())
                .unwrap_or_default();
            Ok(OperationResult::Records(records))
        }
        Operation::Search {
            model,
            filter,
            limit,
        } => {
            let records: Vec<Record> = tables
                .get(model)
                .map(|t| {
                    t.rows
                        .values()
                        .filter(|r| matches(r, filter))
                        .take(limit.unwrap_or(usize::MAX))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(OperationResult::Records(records))
        }
        Operation::Count { model, filter } => {
            let count = tables
                .get(model)
                .map(|t| t.rows.values().filter(|r| matches(r, filter)).count())
                .unwrap_or(0);
            Ok(OperationResult::Count(count))
        }
        Operation::Write { model, ids, values } => {
            if values.contains_key("id") {
                return Err(PersistenceError::InvalidOperation(
                    "the 'id' field cannot be written".into(),
                ));
            }
            let mut affected = 0;
            if let Some(table) = tables.get_mut(model) {
                for id in ids {
                    if let Some(record) = table.rows.get_mut(id) {
                        for (k, v) in values {
                            record.insert(k.clone(), v.clone());
                        }
                        affected += 1;
                    }
                }
            }
            Ok(OperationResult::Affected(affected))
        }
        Operation::Unlink { model, ids } => {
            let mut affected = 0;
            if let Some(table) = tables.get_mut(model) {
                for id in ids {
                    if table.rows.remove(id).is_some() {
                        affected += 1;
                    }
                }
            }
            Ok(OperationResult::Affected(affected))
        }
    }
}

#[derive(Debug)]
struct TxState {
    working: Tables,
    savepoints: Vec<(String, Tables)>,
    closed: bool,
}

/// A connection to a [`MemoryPersistence`].
#[derive(Debug)]
pub struct MemoryConnection {
    committed: Arc<Mutex<Tables>>,
    state: Mutex<TxState>,
}

impl MemoryConnection {
    fn open(committed: Arc<Mutex<Tables>>) -> Self {
        let working = committed.lock().clone();
        Self {
            committed,
            state: Mutex::new(TxState {
                working,
                savepoints: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Returns `true` once [`close`](Connection::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Connection for MemoryConnection {
    fn execute(&self, operation: &Operation) -> Result<OperationResult, PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Closed);
        }
        apply(&mut state.working, operation)
    }

    fn savepoint(&self, name: &str) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Closed);
        }
        let snapshot = state.working.clone();
        state.savepoints.push((name.to_string(), snapshot));
        Ok(())
    }

    fn rollback_to(&self, name: &str) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Closed);
        }
        let pos = state
            .savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| PersistenceError::UnknownSavepoint(name.to_string()))?;
        state.savepoints.truncate(pos + 1);
        state.working = state.savepoints[pos].1.clone();
        Ok(())
    }

    fn release(&self, name: &str) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Closed);
        }
        let pos = state
            .savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| PersistenceError::UnknownSavepoint(name.to_string()))?;
        state.savepoints.truncate(pos);
        Ok(())
    }

    fn commit(&self) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Closed);
        }
        *self.committed.lock() = state.working.clone();
        state.savepoints.clear();
        Ok(())
    }

    fn rollback(&self) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Closed);
        }
        state.working = self.committed.lock().clone();
        state.savepoints.clear();
        Ok(())
    }

    fn close(&self) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        state.closed = true;
        state.savepoints.clear();
        Ok(())
    }
}

/// In-memory [`Persistence`](super::Persistence) backend.
///
/// # Example
///
/// ```
/// use serde_json::{json, Map};
/// use webshell_runtime::{Connection, MemoryPersistence, Operation, OperationResult, Persistence};
///
/// let db = MemoryPersistence::new();
/// let mut values = Map::new();
/// values.insert("name".into(), json!("Ada"));
/// let result = db
///     .ambient()
///     .execute(&Operation::Create { model: "res.partner".into(), values })
///     .expect("create");
/// assert_eq!(result, OperationResult::Created(1));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    committed: Arc<Mutex<Tables>>,
    ambient: Arc<MemoryConnection>,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        let committed = Arc::new(Mutex::new(Tables::new()));
        let ambient = Arc::new(MemoryConnection::open(Arc::clone(&committed)));
        Self { committed, ambient }
    }

    /// Committed records of `model`, ordered by id.
    #[must_use]
    pub fn committed_records(&self, model: &str) -> Vec<Record> {
        self.committed
            .lock()
            .get(model)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Persistence for MemoryPersistence {
    fn ambient(&self) -> Arc<dyn Connection> {
        self.ambient.clone()
    }

    fn new_isolated_connection(&self) -> Result<Arc<dyn Connection>, PersistenceError> {
        Ok(Arc::new(MemoryConnection::open(Arc::clone(&self.committed))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Persistence;
    use serde_json::{json, Map};

    fn values(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    fn create(conn: &dyn Connection, name: &str) -> i64 {
        match conn
            .execute(&Operation::Create {
                model: "res.partner".into(),
                values: values(json!({ "name": name })),
            })
            .expect("create")
        {
            OperationResult::Created(id) => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn count(conn: &dyn Connection) -> usize {
        match conn
            .execute(&Operation::Count {
                model: "res.partner".into(),
                filter: Map::new(),
            })
            .expect("count")
        {
            OperationResult::Count(n) => n,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let db = MemoryPersistence::new();
        let conn = db.ambient();
        assert_eq!(create(conn.as_ref(), "a"), 1);
        assert_eq!(create(conn.as_ref(), "b"), 2);
        assert_eq!(count(conn.as_ref()), 2);
    }

    #[test]
    fn uncommitted_changes_are_invisible_to_other_connections() {
        let db = MemoryPersistence::new();
        create(db.ambient().as_ref(), "a");

        let other = db.new_isolated_connection().expect("open");
        assert_eq!(count(other.as_ref()), 0);

        db.ambient().commit().expect("commit");
        let later = db.new_isolated_connection().expect("open");
        assert_eq!(count(later.as_ref()), 1);
        assert_eq!(db.committed_records("res.partner").len(), 1);
    }

    #[test]
    fn rollback_to_savepoint_undoes_later_work_only() {
        let db = MemoryPersistence::new();
        let conn = db.new_isolated_connection().expect("open");
        create(conn.as_ref(), "before");
        conn.savepoint("sp").expect("savepoint");
        create(conn.as_ref(), "after");
        assert_eq!(count(conn.as_ref()), 2);

        conn.rollback_to("sp").expect("rollback_to");
        assert_eq!(count(conn.as_ref()), 1);
    }

    #[test]
    fn unknown_savepoint_is_an_error() {
        let db = MemoryPersistence::new();
        let conn = db.new_isolated_connection().expect("open");
        assert_eq!(
            conn.rollback_to("nope"),
            Err(PersistenceError::UnknownSavepoint("nope".into()))
        );
    }

    #[test]
    fn closed_connection_rejects_work() {
        let db = MemoryPersistence::new();
        let conn = db.new_isolated_connection().expect("open");
        conn.close().expect("close");
        conn.close().expect("close twice");
        assert_eq!(
            conn.execute(&Operation::Read {
                model: "res.partner".into(),
                ids: vec![1],
            }),
            Err(PersistenceError::Closed)
        );
    }

    #[test]
    fn checkpoint_drop_reverts_and_closes() {
        let db = MemoryPersistence::new();
        let checkpoint = db.open_scoped_checkpoint().expect("checkpoint");
        let conn = checkpoint.connection();
        create(conn.as_ref(), "discarded");
        assert_eq!(count(conn.as_ref()), 1);

        drop(checkpoint);
        assert!(db.committed_records("res.partner").is_empty());
        assert_eq!(count(db.ambient().as_ref()), 0);
        assert_eq!(
            conn.execute(&Operation::Count {
                model: "res.partner".into(),
                filter: Map::new()
            }),
            Err(PersistenceError::Closed)
        );
    }

    #[test]
    fn explicit_checkpoint_rollback() {
        let db = MemoryPersistence::new();
        let checkpoint = db.open_scoped_checkpoint().expect("checkpoint");
        let conn = checkpoint.connection();
        create(conn.as_ref(), "x");
        checkpoint.rollback().expect("rollback");
        assert!(db.committed_records("res.partner").is_empty());
        assert_eq!(
            conn.execute(&Operation::Count {
                model: "res.partner".into(),
                filter: Map::new()
            }),
            Err(PersistenceError::Closed)
        );
    }

    #[test]
    fn write_and_unlink() {
        let db = MemoryPersistence::new();
        let conn = db.ambient();
        let id = create(conn.as_ref(), "old");
        let written = conn
            .execute(&Operation::Write {
                model: "res.partner".into(),
                ids: vec![id, 99],
                values: values(json!({"name": "new"})),
            })
            .expect("write");
        assert_eq!(written, OperationResult::Affected(1));

        let read = conn
            .execute(&Operation::Read {
                model: "res.partner".into(),
                ids: vec![id],
            })
            .expect("read");
        match read {
            OperationResult::Records(rows) => assert_eq!(rows[0]["name"], json!("new")),
            other => panic!("unexpected {other:?}"),
        }

        let removed = conn
            .execute(&Operation::Unlink {
                model: "res.partner".into(),
                ids: vec![id],
            })
            .expect("unlink");
        assert_eq!(removed, OperationResult::Affected(1));
        assert_eq!(count(conn.as_ref()), 0);
    }

    #[test]
    fn writing_id_is_rejected() {
        let db = MemoryPersistence::new();
        let conn = db.ambient();
        let id = create(conn.as_ref(), "a");
        let err = conn
            .execute(&Operation::Write {
                model: "res.partner".into(),
                ids: vec![id],
                values: values(json!({"id": 5})),
            })
            .expect_err("should reject");
        assert!(matches!(err, PersistenceError::InvalidOperation(_)));
    }

    #[test]
    fn search_filters_and_limits() {
        let db = MemoryPersistence::new();
        let conn = db.ambient();
        create(conn.as_ref(), "a");
        create(conn.as_ref(), "b");
        create(conn.as_ref(), "a");

        let found = conn
            .execute(&Operation::Search {
                model: "res.partner".into(),
                filter: values(json!({"name": "a"})),
                limit: Some(1),
            })
            .expect("search");
        match found {
            OperationResult::Records(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["id"], json!(1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_model_name_rejected() {
        let db = MemoryPersistence::new();
        let err = db
            .ambient()
            .execute(&Operation::Count {
                model: "bad name;".into(),
                filter: Map::new(),
            })
            .expect_err("should reject");
        assert!(matches!(err, PersistenceError::InvalidOperation(_)));
    }
}
