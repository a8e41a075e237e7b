//! Profiling Collaborator.
//!
//! Runs a snippet on its own interpreter and its own isolated connection,
//! records every data operation, and throws all durable changes away:
//!
//! ```text
//! new_isolated_connection ──► RecordingConnection ──► env handle
//!          │                          │
//!          │                    queries + timings
//!          ▼
//!   rollback + close (always)
//! ```
//!
//! Nothing here touches the operator's session.

use crate::capture::OutputCapture;
use crate::context::{self, RunContext};
use crate::deadline::{DeadlineFault, DeadlineFlag};
use crate::engine::{self, RunOutcome};
use crate::handles::{Bindings, Lease};
use crate::session::new_interpreter;
use crate::ConsoleError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};
use webshell_runtime::{Connection, Namespace, Persistence, RecordingConnection};
use webshell_types::{Operator, ProfileReport};

/// Rolls back and closes a connection when dropped.
struct Discard(Arc<dyn Connection>);

impl Drop for Discard {
    fn drop(&mut self) {
        if let Err(e) = self.0.rollback() {
            error!(error = %e, "profiling rollback failed");
        }
        if let Err(e) = self.0.close() {
            error!(error = %e, "profiling connection close failed");
        }
    }
}

/// Result of a profiling run before it becomes a [`ProfileReport`].
pub(crate) struct Profiled {
    pub report: ProfileReport,
    pub outcome: RunOutcome,
}

/// Profiles `code` for `operator`. Policy checks are the caller's job.
///
/// A deadline abort is reported in [`ProfileReport::error`].
///
/// # Errors
///
/// Returns [`ConsoleError::Internal`] if no interpreter or connection can
/// be created.
pub(crate) fn profile(
    persistence: &dyn Persistence,
    operator: &Operator,
    code: &str,
    budget: Duration,
    max_output: usize,
) -> Result<Profiled, ConsoleError> {
    let lua = new_interpreter()?;
    let recording = Arc::new(RecordingConnection::new(
        persistence.new_isolated_connection()?,
    ));
    let _discard = Discard(recording.clone());

    let bindings = Bindings {
        lease: Lease::new(),
        connection: recording.clone(),
        operator: operator.clone(),
    };
    let capture = OutputCapture::new(max_output);
    let flag = DeadlineFlag::new();
    let scope = lua.create_table()?;
    context::prepare(
        &lua,
        &scope,
        &RunContext {
            bindings: &bindings,
            capture: &capture,
            deadline: &flag,
            budget,
        },
        &Namespace::new(),
    )?;

    let started = Instant::now();
    let outcome = engine::run(&lua, code, &scope, &capture, budget, &flag);
    let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    bindings.lease.revoke();

    let (output, mut err) = capture.parts();
    if outcome == RunOutcome::DeadlineExceeded {
        err.push_str(&DeadlineFault { budget }.to_string());
        err.push('\n');
    }
    let queries = recording.queries();
    debug!(
        queries = queries.len(),
        total_time_ms,
        outcome = ?outcome,
        "profiling run finished"
    );

    Ok(Profiled {
        report: ProfileReport {
            total_time_ms,
            total_queries: queries.len(),
            queries,
            output,
            error: (!err.is_empty()).then_some(err),
        },
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use webshell_runtime::MemoryPersistence;

    fn admin() -> Operator {
        Operator::new(2, "admin")
    }

    #[test]
    fn records_queries_and_discards_changes() {
        let db = MemoryPersistence::new();
        let profiled = profile(
            &db,
            &admin(),
            r#"
            local p = env["res.partner"]
            p:create({ name = "tmp" })
            print(p:search_count())
            "#,
            Duration::from_secs(5),
            4096,
        )
        .expect("profile");

        let report = profiled.report;
        assert_eq!(profiled.outcome, RunOutcome::Completed);
        assert_eq!(report.total_queries, 2);
        assert!(report.queries[0].sql.starts_with("INSERT INTO"));
        assert!(report.queries[1].sql.starts_with("SELECT COUNT(*)"));
        assert_eq!(report.output, "1\n");
        assert!(report.error.is_none());
        assert!(db.committed_records("res.partner").is_empty());
    }

    #[test]
    fn faults_land_in_error() {
        let db = MemoryPersistence::new();
        let report = profile(&db, &admin(), "error('nope')", Duration::from_secs(5), 4096)
            .expect("profile")
            .report;
        assert!(report.error.expect("error").contains("nope"));
    }

    #[test]
    fn deadline_is_reported_not_raised() {
        let db = MemoryPersistence::new();
        let profiled = profile(
            &db,
            &admin(),
            "while true do end",
            Duration::from_millis(50),
            4096,
        )
        .expect("profile");
        assert_eq!(profiled.outcome, RunOutcome::DeadlineExceeded);
        assert!(profiled
            .report
            .error
            .expect("error")
            .contains("time limit"));
    }
}
