//! Request and response shapes of the two exposed operations.
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | `execute` | [`ExecutionRequest`] | [`ExecutionOutput`] |
//! | `profile` | code + operator | [`ProfileReport`] |

use crate::Operator;
use serde::{Deserialize, Serialize};

/// A snippet submitted for interactive execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Lua source text.
    pub code: String,
    /// Roll back every durable side effect after the run.
    #[serde(default)]
    pub safe_mode: bool,
    /// Who submitted the snippet.
    pub operator: Operator,
}

impl ExecutionRequest {
    /// Creates a normal (non safe-mode) request.
    #[must_use]
    pub fn new(operator: Operator, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            safe_mode: false,
            operator,
        }
    }

    /// Sets the safe-mode flag.
    #[must_use]
    pub fn with_safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = safe_mode;
        self
    }
}

/// Combined captured output of one run.
///
/// Normal output first, then error output. Serialises as `{"output": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub output: String,
}

impl ExecutionOutput {
    #[must_use]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

/// One persistence operation observed while profiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// SQL-like rendering of the operation.
    pub sql: String,
    /// Wall-clock duration in milliseconds.
    pub time: f64,
}

/// Result of a profiling run.
///
/// A report is produced even when the snippet faults; the fault text is in
/// [`error`](Self::error).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    /// Total wall-clock time of the run in milliseconds.
    pub total_time_ms: f64,
    /// Number of persistence operations issued.
    pub total_queries: usize,
    /// Every operation, in issue order.
    pub queries: Vec<QueryRecord>,
    /// Captured normal output.
    pub output: String,
    /// Fault text, if the snippet failed.
    pub error: Option<String>,
}
