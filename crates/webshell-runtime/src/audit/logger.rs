//! Fail-open audit front end.

use super::{AuditAction, AuditEvent, AuditRecord, AuditSink, TracingAuditSink};
use crate::config::DEFAULT_AUDIT_CODE_CHARS;
use std::sync::Arc;
use tracing::error;
use webshell_types::Operator;

/// Builds records and hands them to a sink, swallowing sink failures.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    code_chars: usize,
}

impl AuditLogger {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            code_chars: DEFAULT_AUDIT_CODE_CHARS,
        }
    }

    /// Logger writing to [`TracingAuditSink`].
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    #[must_use]
    pub fn with_code_chars(mut self, code_chars: usize) -> Self {
        self.code_chars = code_chars;
        self
    }

    #[must_use]
    pub fn code_chars(&self) -> usize {
        self.code_chars
    }

    /// Records one event. Never fails.
    pub fn log(
        &self,
        operator: &Operator,
        code: &str,
        safe_mode: bool,
        action: AuditAction,
        event: AuditEvent,
    ) {
        let record = AuditRecord::new(operator, code, self.code_chars, safe_mode, action, event);
        if let Err(e) = self.sink.record(&record) {
            error!(
                operator = %operator.id,
                event = record.event.kind(),
                error = %e,
                "audit sink failed; continuing"
            );
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("code_chars", &self.code_chars)
            .finish_non_exhaustive()
    }
}
