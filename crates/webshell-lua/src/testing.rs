//! Console test harness.
//!
//! [`ConsoleHarness`] wires a [`Console`] to in-memory persistence, a
//! memory audit sink and a runtime parameter table, and acts as a fixed
//! privileged operator.
//!
//! # Example
//!
//! ```
//! use webshell_lua::testing::ConsoleHarness;
//!
//! let harness = ConsoleHarness::new();
//! let out = harness
//!     .execute_safe(r#"env["res.partner"]:create({ name = "tmp" })"#)
//!     .expect("execute");
//! assert!(out.contains("SAFE MODE"));
//! assert!(harness.records("res.partner").is_empty());
//! ```

use crate::{Console, ConsoleError};
use serde_json::Map;
use std::sync::Arc;
use webshell_auth::RoleTable;
use webshell_runtime::config::{BLOCKED_PATTERNS_KEY, MAX_OUTPUT_KEY, TIMEOUT_KEY};
use webshell_runtime::{
    AuditLogger, AuditRecord, MemoryAuditSink, MemoryPersistence, Operation,
    OperationResult, ParameterStore, Persistence, PersistenceError, Record,
};
use webshell_types::{ExecutionRequest, Operator, ProfileReport};

/// Login granted the privileged role by the harness.
pub const ADMIN_LOGIN: &str = "admin";

/// Test harness around a [`Console`].
pub struct ConsoleHarness {
    console: Console,
    persistence: MemoryPersistence,
    audit: Arc<MemoryAuditSink>,
    params: Arc<ParameterStore>,
    operator: Operator,
}

impl ConsoleHarness {
    /// Harness acting as operator 2, `admin`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_operator(Operator::new(2, ADMIN_LOGIN))
    }

    /// Harness acting as `operator`. Only [`ADMIN_LOGIN`] is privileged.
    #[must_use]
    pub fn with_operator(operator: Operator) -> Self {
        let persistence = MemoryPersistence::new();
        let audit = Arc::new(MemoryAuditSink::new());
        let params = Arc::new(ParameterStore::new());
        let console = Console::new(
            Arc::new(RoleTable::new().with_login(ADMIN_LOGIN)),
            params.clone(),
            Arc::new(persistence.clone()),
        )
        .with_audit(AuditLogger::new(audit.clone()));
        Self {
            console,
            persistence,
            audit,
            params,
            operator,
        }
    }

    #[must_use]
    pub fn console(&self) -> &Console {
        &self.console
    }

    #[must_use]
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    #[must_use]
    pub fn persistence(&self) -> &MemoryPersistence {
        &self.persistence
    }

    /// Runs `code` as the harness operator and returns the output text.
    ///
    /// # Errors
    ///
    /// Whatever [`Console::execute`] returns.
    pub fn execute(&self, code: &str) -> Result<String, ConsoleError> {
        self.execute_as(&self.operator, code, false)
    }

    /// Runs `code` in safe mode.
    ///
    /// # Errors
    ///
    /// Whatever [`Console::execute`] returns.
    pub fn execute_safe(&self, code: &str) -> Result<String, ConsoleError> {
        self.execute_as(&self.operator, code, true)
    }

    /// Runs `code` as another operator.
    ///
    /// # Errors
    ///
    /// Whatever [`Console::execute`] returns.
    pub fn execute_as(
        &self,
        operator: &Operator,
        code: &str,
        safe_mode: bool,
    ) -> Result<String, ConsoleError> {
        let request = ExecutionRequest::new(operator.clone(), code).with_safe_mode(safe_mode);
        self.console.execute(&request).map(|out| out.output)
    }

    /// Profiles `code` as the harness operator.
    ///
    /// # Errors
    ///
    /// Whatever [`Console::profile`] returns.
    pub fn profile(&self, code: &str) -> Result<ProfileReport, ConsoleError> {
        self.console.profile(&self.operator, code)
    }

    pub fn set_timeout_secs(&self, secs: u64) {
        self.params.set(TIMEOUT_KEY, secs.to_string());
    }

    pub fn set_blocked_patterns(&self, patterns: &[&str]) {
        self.params.set(BLOCKED_PATTERNS_KEY, patterns.join(","));
    }

    pub fn set_max_output_bytes(&self, bytes: usize) {
        self.params.set(MAX_OUTPUT_KEY, bytes.to_string());
    }

    /// Sets a raw configuration parameter.
    pub fn set_param(&self, key: &str, value: &str) {
        self.params.set(key, value);
    }

    /// Committed records of `model`.
    #[must_use]
    pub fn records(&self, model: &str) -> Vec<Record> {
        self.persistence.committed_records(model)
    }

    /// Records of `model` visible on the ambient connection, committed or
    /// not.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the search fails.
    pub fn visible_records(&self, model: &str) -> Result<Vec<Record>, PersistenceError> {
        let search = Operation::Search {
            model: model.to_string(),
            filter: Map::new(),
            limit: None,
        };
        match self.persistence.ambient().execute(&search)? {
            OperationResult::Records(rows) => Ok(rows),
            other => Err(PersistenceError::Backend(format!(
                "unexpected search result: {other:?}"
            ))),
        }
    }

    /// Commits the ambient connection.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the commit fails.
    pub fn commit(&self) -> Result<(), PersistenceError> {
        self.persistence.ambient().commit()
    }

    #[must_use]
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit.records()
    }
}

impl Default for ConsoleHarness {
    fn default() -> Self {
        Self::new()
    }
}
