//! Deadline Controller.
//!
//! A wall-clock budget enforced with cooperative interrupt checkpoints:
//! an instruction-count hook runs every [`CHECK_INTERVAL`] VM instructions
//! and raises [`DeadlineFault`] once the budget is spent.
//!
//! ```text
//! arm(lua, budget, flag) ──► hook installed ──► ... ──► Instant::now() >= deadline
//!         │                                                   │
//!         │                                       flag.fire(); Err(DeadlineFault)
//!         ▼                                                   │
//!   DeadlineGuard ── drop ──► hook removed          unwinds through the snippet
//! ```
//!
//! Once fired, the hook keeps failing at every checkpoint, and the guarded
//! `pcall`/`xpcall` in the execution context re-raise, so a snippet cannot
//! swallow the fault and keep running.
//!
//! Time spent inside Rust callbacks (capability handles) is not interrupted;
//! the fault is raised at the first checkpoint after the callback returns.

use mlua::{HookTriggers, Lua, VmState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// VM instructions between two deadline checks.
pub const CHECK_INTERVAL: u32 = 1000;

/// Raised inside the interpreter when the budget is spent.
#[derive(Debug, Clone, Error)]
#[error("execution exceeded the time limit ({}s)", .budget.as_secs())]
pub struct DeadlineFault {
    pub budget: Duration,
}

/// Shared "the deadline fired" bit.
///
/// The engine checks it after a run instead of inspecting the error chain,
/// which may have been rewrapped by the snippet.
#[derive(Debug, Clone, Default)]
pub struct DeadlineFlag(Arc<AtomicBool>);

impl DeadlineFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Armed deadline. Dropping it disarms.
#[must_use = "the deadline is disarmed when the guard is dropped"]
pub struct DeadlineGuard<'lua> {
    lua: &'lua Lua,
    armed: bool,
}

impl DeadlineGuard<'_> {
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Removes the hook. Safe to call any number of times.
    pub fn disarm(&mut self) {
        if self.armed {
            self.lua.remove_hook();
            self.armed = false;
            debug!("deadline disarmed");
        }
    }
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Arms a deadline of `budget` on `lua`.
///
/// A zero budget, or one too large to represent, leaves the run unbounded
/// and logs a warning.
pub fn arm<'lua>(lua: &'lua Lua, budget: Duration, flag: &DeadlineFlag) -> DeadlineGuard<'lua> {
    let deadline = match Instant::now().checked_add(budget) {
        Some(deadline) if !budget.is_zero() => deadline,
        _ => {
            warn!(
                budget_secs = budget.as_secs(),
                "deadline not enforced for this run"
            );
            return DeadlineGuard { lua, armed: false };
        }
    };

    let flag = flag.clone();
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(CHECK_INTERVAL),
        move |_lua, _debug| {
            if flag.is_fired() || Instant::now() >= deadline {
                flag.fire();
                return Err(mlua::Error::external(DeadlineFault { budget }));
            }
            Ok(VmState::Continue)
        },
    );
    debug!(budget_ms = budget.as_millis() as u64, "deadline armed");
    DeadlineGuard { lua, armed: true }
}
