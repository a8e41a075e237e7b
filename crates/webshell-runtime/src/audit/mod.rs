//! Audit logging of code submissions.
//!
//! Every submission that passes authorization produces exactly two records:
//!
//! ```text
//! Attempt ──► (blocklist) ──► Blocked { pattern }
//!                         └─► Completed | DeadlineExceeded
//! ```
//!
//! The attempt is written before the blocklist check so that blocked
//! submissions leave a trace of what was tried.
//!
//! Logging fails open: a sink error is reported through `tracing` and never
//! blocks execution.

mod error;
mod logger;
mod record;
mod sink;

pub use error::AuditError;
pub use logger::AuditLogger;
pub use record::{AuditAction, AuditEvent, AuditRecord};
pub use sink::{AuditSink, FanoutAuditSink, JsonlAuditSink, MemoryAuditSink, TracingAuditSink};
