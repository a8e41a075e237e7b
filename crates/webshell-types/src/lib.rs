//! Core value types for webshell.
//!
//! This crate sits at the bottom of the dependency graph:
//!
//! ```text
//! webshell-types  (OperatorId, Operator, requests, reports)  ◄── HERE
//!     ↑
//! webshell-auth   (AuthCapability, Blocklist, PolicyGate)
//!     ↑
//! webshell-runtime (config, persistence, session store, audit)
//!     ↑
//! webshell-lua    (engine, deadline, safe mode, profiler, Console)
//!     ↑
//! webshell-cli    (interactive binary)
//! ```
//!
//! Everything here is a plain value: `Clone`, `Serialize`, `Deserialize`,
//! no behaviour beyond construction and display.

mod id;
mod request;

pub use id::{Operator, OperatorId};
pub use request::{ExecutionOutput, ExecutionRequest, ProfileReport, QueryRecord};
