//! Audit record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use webshell_types::{Operator, OperatorId};

/// Which exposed operation was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Execute,
    Profile,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute => f.write_str("execute"),
            Self::Profile => f.write_str("profile"),
        }
    }
}

/// What happened to the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Code was submitted by an authorized operator.
    Attempt,
    /// The blocklist rejected the code.
    Blocked { pattern: String },
    /// The run finished, with or without a caught runtime fault.
    Completed,
    /// The deadline aborted the run.
    DeadlineExceeded,
    /// A host-side failure ended the submission after it was admitted.
    Failed { reason: String },
}

impl AuditEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attempt => "attempt",
            Self::Blocked { .. } => "blocked",
            Self::Completed => "completed",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operator: OperatorId,
    pub login: String,
    /// Leading characters of the submitted code.
    pub code: String,
    pub safe_mode: bool,
    pub action: AuditAction,
    pub event: AuditEvent,
}

impl AuditRecord {
    /// Builds a record stamped now, keeping at most `code_chars` characters
    /// of `code`.
    #[must_use]
    pub fn new(
        operator: &Operator,
        code: &str,
        code_chars: usize,
        safe_mode: bool,
        action: AuditAction,
        event: AuditEvent,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operator: operator.id,
            login: operator.login.clone(),
            code: code.chars().take(code_chars).collect(),
            safe_mode,
            action,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_prefix_counts_characters_not_bytes() {
        let op = Operator::new(2, "admin");
        let rec = AuditRecord::new(
            &op,
            "héllo wörld",
            4,
            false,
            AuditAction::Execute,
            AuditEvent::Attempt,
        );
        assert_eq!(rec.code, "héll");
    }

    #[test]
    fn serializes_event_with_kind_tag() {
        let op = Operator::new(2, "admin");
        let rec = AuditRecord::new(
            &op,
            "x",
            500,
            true,
            AuditAction::Profile,
            AuditEvent::Blocked {
                pattern: "io.popen".into(),
            },
        );
        let json = serde_json::to_value(&rec).expect("serialize");
        assert_eq!(json["operator"], 2);
        assert_eq!(json["action"], "profile");
        assert_eq!(json["event"]["kind"], "blocked");
        assert_eq!(json["event"]["pattern"], "io.popen");
    }

    #[test]
    fn failed_event_carries_reason() {
        let event = AuditEvent::Failed {
            reason: "interpreter error".into(),
        };
        assert_eq!(event.kind(), "failed");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["reason"], "interpreter error");
    }
}
