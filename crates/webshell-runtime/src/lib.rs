//! webshell runtime layer.
//!
//! Everything the console consumes but does not execute itself:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  webshell-runtime (THIS CRATE)            │
//! ├───────────────────────────────────────────────────────────┤
//! │  config/      : ShellConfig, ConfigLoader, ConfigCapability│
//! │  persistence/ : Persistence, Connection, Checkpoint,       │
//! │                 MemoryPersistence, RecordingConnection     │
//! │  session/     : SessionStore, Namespace                    │
//! │  audit/       : AuditLogger, AuditSink impls               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Process-local state
//!
//! [`SessionStore`](session::SessionStore) lives in process memory. Each
//! worker process of a multi-process deployment has its own store, so an
//! operator whose requests land on different workers sees different
//! variables. This is a known limitation, not something the store tries to
//! hide.

pub mod audit;
pub mod config;
pub mod persistence;
pub mod session;

pub use audit::{
    AuditAction, AuditError, AuditEvent, AuditLogger, AuditRecord, AuditSink, FanoutAuditSink,
    JsonlAuditSink, MemoryAuditSink, TracingAuditSink,
};
pub use config::{ConfigCapability, ConfigError, ConfigLoader, ParameterStore, ShellConfig};
pub use persistence::{
    Checkpoint, Connection, Filter, MemoryConnection, MemoryPersistence, Operation,
    OperationResult, Persistence, PersistenceError, Record, RecordingConnection,
};
pub use session::{Namespace, SessionError, SessionState, SessionStore};
