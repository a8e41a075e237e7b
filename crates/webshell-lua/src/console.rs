//! The console facade: `execute` and `profile`.
//!
//! ```text
//! execute(request)
//!   authorize ─────────────────────────────► AccessDenied
//!   audit Attempt
//!   screen ──────────────► audit Blocked ──► BlockedPattern
//!   lock operator session
//!   [safe] open_scoped_checkpoint
//!   prepare context ─► engine::run ─► revoke handles
//!   [safe] rollback checkpoint
//!   DeadlineExceeded ─► discard context, audit ─► DeadlineExceeded
//!   Completed ─► copy namespace back, [safe] notice, audit ─► output
//!   host failure after Attempt ─► audit Failed ─► Internal
//! ```

use crate::capture::OutputCapture;
use crate::context::{self, RunContext};
use crate::deadline::{self, DeadlineFlag};
use crate::engine::{self, RunOutcome};
use crate::handles::{Bindings, Lease};
use crate::profiler;
use crate::render;
use crate::session::{self, LuaSessionStore};
use crate::ConsoleError;
use mlua::Function;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use webshell_auth::{AuthCapability, PolicyError, PolicyGate};
use webshell_runtime::config::{execution_blocklist, execution_max_output, execution_timeout};
use webshell_runtime::{
    AuditAction, AuditEvent, AuditLogger, ConfigCapability, Persistence, SessionState,
};
use webshell_types::{ExecutionOutput, ExecutionRequest, Operator, OperatorId, ProfileReport};

/// Line appended to the output of every finished safe-mode run.
pub const SAFE_MODE_NOTICE: &str = "\nSAFE MODE: Transaction rolled back automatically.\n";

/// Interactive code-execution console.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and block the
/// calling thread for the duration of the run.
pub struct Console {
    gate: PolicyGate,
    config: Arc<dyn ConfigCapability>,
    persistence: Arc<dyn Persistence>,
    audit: AuditLogger,
    sessions: LuaSessionStore,
}

impl Console {
    /// Creates a console that audits to `tracing`.
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthCapability>,
        config: Arc<dyn ConfigCapability>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            gate: PolicyGate::new(auth),
            config,
            persistence,
            audit: AuditLogger::tracing(),
            sessions: session::new_store(),
        }
    }

    #[must_use]
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Runs a snippet in the operator's session.
    ///
    /// # Errors
    ///
    /// - [`ConsoleError::AccessDenied`] for unprivileged operators
    /// - [`ConsoleError::BlockedPattern`] when the code matches the blocklist
    /// - [`ConsoleError::DeadlineExceeded`] when the run was aborted
    /// - [`ConsoleError::Internal`] for host-side failures
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutput, ConsoleError> {
        let operator = &request.operator;
        let code = request.code.as_str();
        let safe_mode = request.safe_mode;

        self.admit(operator, code, safe_mode, AuditAction::Execute)?;
        self.run_admitted(request).inspect_err(|e| {
            self.audit_failure(operator, code, safe_mode, AuditAction::Execute, e);
        })
    }

    fn run_admitted(&self, request: &ExecutionRequest) -> Result<ExecutionOutput, ConsoleError> {
        let operator = &request.operator;
        let code = request.code.as_str();
        let safe_mode = request.safe_mode;

        let budget = execution_timeout(self.config.as_ref());
        let max_output = execution_max_output(self.config.as_ref());

        let handle = self.sessions.session(operator.id)?;
        let mut session = handle.lock();
        self.sessions
            .check_reserved(session.namespace().names())?;

        let checkpoint = if safe_mode {
            Some(self.persistence.open_scoped_checkpoint()?)
        } else {
            None
        };
        let connection = match &checkpoint {
            Some(checkpoint) => checkpoint.connection(),
            None => self.persistence.ambient(),
        };

        let bindings = Bindings {
            lease: Lease::new(),
            connection,
            operator: operator.clone(),
        };
        let capture = OutputCapture::new(max_output);
        let flag = DeadlineFlag::new();
        let scope = session.scope()?;
        context::prepare(
            session.lua(),
            &scope,
            &RunContext {
                bindings: &bindings,
                capture: &capture,
                deadline: &flag,
                budget,
            },
            session.namespace(),
        )?;

        let outcome = engine::run(session.lua(), code, &scope, &capture, budget, &flag);
        bindings.lease.revoke();

        if let Some(checkpoint) = checkpoint {
            if let Err(e) = checkpoint.rollback() {
                error!(operator = %operator.id, error = %e, "safe mode rollback failed");
            }
        }

        match outcome {
            RunOutcome::DeadlineExceeded => {
                session.discard_scope();
                self.audit
                    .log(operator, code, safe_mode, AuditAction::Execute, AuditEvent::DeadlineExceeded);
                info!(operator = %operator.id, budget_secs = budget.as_secs(), "run aborted by deadline");
                Err(ConsoleError::DeadlineExceeded { budget })
            }
            RunOutcome::Completed => {
                let update = context::collect(&scope)?;
                let cleared: Vec<String> = session
                    .namespace()
                    .names()
                    .filter(|name| !update.contains(name))
                    .map(String::from)
                    .collect();
                let namespace = session.namespace_mut();
                for name in &cleared {
                    namespace.remove(name);
                }
                namespace.merge(update);
                if capture.is_truncated() {
                    debug!(operator = %operator.id, max_output, "run output truncated");
                }
                if safe_mode {
                    capture.notice(SAFE_MODE_NOTICE);
                }
                self.audit
                    .log(operator, code, safe_mode, AuditAction::Execute, AuditEvent::Completed);
                Ok(ExecutionOutput::new(capture.combined()))
            }
        }
    }

    /// Runs a snippet in isolation and reports timing and queries.
    ///
    /// Durable changes are always discarded and the operator's session is
    /// never read or written.
    ///
    /// # Errors
    ///
    /// - [`ConsoleError::AccessDenied`] for unprivileged operators
    /// - [`ConsoleError::BlockedPattern`] when the code matches the blocklist
    /// - [`ConsoleError::Internal`] for host-side failures
    pub fn profile(&self, operator: &Operator, code: &str) -> Result<ProfileReport, ConsoleError> {
        self.admit(operator, code, false, AuditAction::Profile)?;

        let budget = execution_timeout(self.config.as_ref());
        let max_output = execution_max_output(self.config.as_ref());
        let profiled = profiler::profile(self.persistence.as_ref(), operator, code, budget, max_output)
            .inspect_err(|e| self.audit_failure(operator, code, false, AuditAction::Profile, e))?;

        let event = match profiled.outcome {
            RunOutcome::Completed => AuditEvent::Completed,
            RunOutcome::DeadlineExceeded => AuditEvent::DeadlineExceeded,
        };
        self.audit.log(operator, code, false, AuditAction::Profile, event);
        Ok(profiled.report)
    }

    /// Drops the operator's session, variables and interpreter included.
    pub fn clear_session(&self, operator: OperatorId) -> bool {
        self.sessions.clear(operator)
    }

    /// Drops every session.
    pub fn reset_sessions(&self) {
        self.sessions.reset();
    }

    /// Lists the operator's session variables with rendered values.
    ///
    /// Rendering may call `__tostring` metamethods, so it runs under the
    /// configured deadline; values left unrendered show the fault instead.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AccessDenied`] for unprivileged operators.
    pub fn variables(&self, operator: &Operator) -> Result<Vec<(String, String)>, ConsoleError> {
        self.gate.authorize(operator)?;
        let budget = execution_timeout(self.config.as_ref());
        let handle = self.sessions.session(operator.id)?;
        let session = handle.lock();
        let tostring: Function = session.lua().globals().get("tostring")?;

        let flag = DeadlineFlag::new();
        let _guard = deadline::arm(session.lua(), budget, &flag);
        let vars: Vec<(String, String)> = session
            .namespace()
            .iter()
            .map(|(name, value)| {
                let shown = render::render_value(&tostring, value)
                    .unwrap_or_else(|e| format!("<{e}>"));
                (name.clone(), shown)
            })
            .collect();
        if flag.is_fired() {
            warn!(operator = %operator.id, budget_secs = budget.as_secs(), "variable rendering hit the deadline");
        }
        Ok(vars)
    }

    /// Closes an admitted submission that failed on the host side.
    fn audit_failure(
        &self,
        operator: &Operator,
        code: &str,
        safe_mode: bool,
        action: AuditAction,
        err: &ConsoleError,
    ) {
        if let ConsoleError::Internal(reason) = err {
            error!(operator = %operator.id, action = %action, error = %reason, "admitted submission failed");
            self.audit.log(
                operator,
                code,
                safe_mode,
                action,
                AuditEvent::Failed {
                    reason: reason.clone(),
                },
            );
        }
    }

    /// Authorization, attempt audit, blocklist screening.
    fn admit(
        &self,
        operator: &Operator,
        code: &str,
        safe_mode: bool,
        action: AuditAction,
    ) -> Result<(), ConsoleError> {
        self.gate.authorize(operator)?;
        self.audit
            .log(operator, code, safe_mode, action, AuditEvent::Attempt);

        let blocklist = execution_blocklist(self.config.as_ref());
        if let Err(e) = self.gate.screen(code, &blocklist) {
            if let PolicyError::BlockedPattern { pattern } = &e {
                self.audit.log(
                    operator,
                    code,
                    safe_mode,
                    action,
                    AuditEvent::Blocked {
                        pattern: pattern.clone(),
                    },
                );
            }
            return Err(e.into());
        }
        debug!(operator = %operator.id, action = %action, "submission admitted");
        Ok(())
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("gate", &self.gate)
            .field("audit", &self.audit)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webshell_auth::RoleTable;
    use webshell_runtime::{
        Connection, MemoryAuditSink, MemoryPersistence, ParameterStore, PersistenceError,
    };

    /// Ambient work succeeds; every isolated connection fails to open.
    struct NoIsolation(MemoryPersistence);

    impl Persistence for NoIsolation {
        fn ambient(&self) -> Arc<dyn Connection> {
            self.0.ambient()
        }

        fn new_isolated_connection(&self) -> Result<Arc<dyn Connection>, PersistenceError> {
            Err(PersistenceError::Backend("pool exhausted".into()))
        }
    }

    fn console() -> Console {
        Console::new(
            Arc::new(RoleTable::new().with_login("admin")),
            Arc::new(ParameterStore::new()),
            Arc::new(MemoryPersistence::new()),
        )
    }

    #[test]
    fn unprivileged_variables_denied() {
        let err = console()
            .variables(&Operator::new(5, "demo"))
            .expect_err("denied");
        assert_eq!(err.kind(), "access_denied");
    }

    #[test]
    fn variables_are_listed_rendered() {
        let console = console();
        let admin = Operator::new(2, "admin");
        console
            .execute(&ExecutionRequest::new(admin.clone(), "a = 1; b = 'x'; c = {1, 2}"))
            .expect("execute");
        let vars = console.variables(&admin).expect("vars");
        assert_eq!(
            vars,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "\"x\"".to_string()),
                ("c".to_string(), "[1,2]".to_string()),
            ]
        );
    }

    #[test]
    fn clear_session_forgets_variables() {
        let console = console();
        let admin = Operator::new(2, "admin");
        console
            .execute(&ExecutionRequest::new(admin.clone(), "x = 1"))
            .expect("execute");
        assert!(console.clear_session(admin.id));
        let out = console
            .execute(&ExecutionRequest::new(admin, "x"))
            .expect("execute");
        assert_eq!(out.output, "");
    }

    #[test]
    fn reset_sessions_forgets_every_operator() {
        let console = Console::new(
            Arc::new(RoleTable::new().with_id(2).with_id(3)),
            Arc::new(ParameterStore::new()),
            Arc::new(MemoryPersistence::new()),
        );
        let a = Operator::new(2, "a");
        let b = Operator::new(3, "b");
        for op in [&a, &b] {
            console
                .execute(&ExecutionRequest::new(op.clone(), "kept = true"))
                .expect("execute");
        }

        console.reset_sessions();

        for op in [a, b] {
            assert!(console.variables(&op).expect("vars").is_empty());
        }
    }

    #[test]
    fn host_failure_after_attempt_is_audited() {
        let sink = Arc::new(MemoryAuditSink::new());
        let console = Console::new(
            Arc::new(RoleTable::new().with_login("admin")),
            Arc::new(ParameterStore::new()),
            Arc::new(NoIsolation(MemoryPersistence::new())),
        )
        .with_audit(AuditLogger::new(sink.clone()));
        let admin = Operator::new(2, "admin");

        let err = console
            .execute(&ExecutionRequest::new(admin.clone(), "1").with_safe_mode(true))
            .expect_err("no checkpoint");
        assert_eq!(err.kind(), "internal");
        let err = console.profile(&admin, "1").expect_err("no connection");
        assert_eq!(err.kind(), "internal");

        let events: Vec<(AuditAction, AuditEvent)> = sink
            .records()
            .into_iter()
            .map(|r| (r.action, r.event))
            .collect();
        assert_eq!(events.len(), 4);
        for (i, action) in [AuditAction::Execute, AuditAction::Profile].into_iter().enumerate() {
            assert_eq!(events[2 * i], (action, AuditEvent::Attempt));
            match &events[2 * i + 1] {
                (a, AuditEvent::Failed { reason }) if *a == action => {
                    assert!(reason.contains("pool exhausted"), "got {reason}");
                }
                other => panic!("expected a failure record, got {other:?}"),
            }
        }

        let out = console
            .execute(&ExecutionRequest::new(admin, "2 + 2"))
            .expect("ambient run still works");
        assert_eq!(out.output, "4\n");
    }
}
