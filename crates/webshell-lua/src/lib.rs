//! Lua execution layer for webshell.
//!
//! Hosts operator snippets in embedded Lua 5.4 interpreters:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Console                            │
//! │  execute(request) ─► PolicyGate ─► SessionStore ─► engine    │
//! │  profile(code)    ─► PolicyGate ─► profiler                  │
//! └──────────────────────────────────────────────────────────────┘
//!        │                 │                  │
//!        ▼                 ▼                  ▼
//!   context (_ENV)     deadline (hook)    handles (env/self/json)
//!        │                                    │
//!        ▼                                    ▼
//!   capture (print/eprint)             Persistence / Connection
//! ```
//!
//! # Modules
//!
//! - [`console`] - the facade
//! - [`engine`] - snippet classification, run, fault formatting
//! - [`deadline`] - wall-clock budget via instruction hook
//! - [`context`] - whitelisted execution context, reserved names
//! - [`handles`] - revocable capability handles
//! - [`capture`] - capped output sinks
//! - [`session`] - per-operator interpreter state
//! - [`render`] - value rendering and JSON conversion
//! - [`testing`] - harness wired to in-memory collaborators
//!
//! # Example
//!
//! ```
//! use webshell_lua::testing::ConsoleHarness;
//!
//! let harness = ConsoleHarness::new();
//! assert_eq!(harness.execute("2+2").expect("execute"), "4\n");
//! harness.execute("x = 5").expect("execute");
//! assert_eq!(harness.execute("x").expect("execute"), "5\n");
//! ```

pub mod capture;
pub mod console;
pub mod context;
pub mod deadline;
pub mod engine;
mod error;
pub mod handles;
mod profiler;
pub mod render;
pub mod session;
pub mod testing;

pub use console::{Console, SAFE_MODE_NOTICE};
pub use engine::{ExecutionMode, RunOutcome};
pub use error::ConsoleError;
