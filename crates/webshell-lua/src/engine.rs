//! Execution Engine.
//!
//! Runs one snippet inside a prepared context:
//!
//! ```text
//! code ──► compile ──► Expression(f) ─┐
//!               ├─────► Statements(f) ──┼──► deadline::arm ──► f() ──► disarm
//!               └─────► syntax error ───┘                               │
//!                     (to error sink)                                   ▼
//!                                         Ok(values) ──► render (expressions only)
//!                                         Err(fault) ──► error sink
//!                                         flag fired ──► RunOutcome::DeadlineExceeded
//! ```
//!
//! Runtime faults never escape: they are written to the error sink and the
//! run counts as completed. Only a fired deadline is reported distinctly.

use crate::capture::OutputCapture;
use crate::deadline::{self, DeadlineFlag};
use crate::render;
use mlua::{Function, Lua, MultiValue, Table};
use std::time::Duration;
use tracing::debug;

/// Chunk name used in error messages and tracebacks.
pub const CHUNK_NAME: &str = "=console";

/// How [`compile`] classified a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// The snippet is a single expression list; its values are shown.
    Expression,
    /// The snippet is a statement block; nothing is shown implicitly.
    Statements,
}

/// A compiled snippet.
pub struct Compiled {
    pub mode: ExecutionMode,
    pub function: Function,
}

/// Compiles `code` against `scope`, preferring expression mode.
///
/// The expression attempt compiles `return <code>` with the code on its own
/// line, so a trailing `--` comment cannot swallow the terminator.
///
/// # Errors
///
/// Returns the statement-mode syntax error when neither form compiles.
pub fn compile(lua: &Lua, code: &str, scope: &Table) -> mlua::Result<Compiled> {
    let as_expression = lua
        .load(format!("return {code}\n;"))
        .set_name(CHUNK_NAME)
        .set_environment(scope.clone())
        .into_function();
    if let Ok(function) = as_expression {
        return Ok(Compiled {
            mode: ExecutionMode::Expression,
            function,
        });
    }

    let function = lua
        .load(code)
        .set_name(CHUNK_NAME)
        .set_environment(scope.clone())
        .into_function()?;
    Ok(Compiled {
        mode: ExecutionMode::Statements,
        function,
    })
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Finished, possibly with a fault written to the error sink.
    Completed,
    /// Aborted by the deadline.
    DeadlineExceeded,
}

/// Compiles and runs `code` in `scope` under a deadline of `budget`.
///
/// `flag` must be the same flag the context's guarded `pcall` watches.
pub fn run(
    lua: &Lua,
    code: &str,
    scope: &Table,
    capture: &OutputCapture,
    budget: Duration,
    flag: &DeadlineFlag,
) -> RunOutcome {
    let compiled = match compile(lua, code, scope) {
        Ok(compiled) => compiled,
        Err(e) => {
            capture.write_err(&format_fault(&e));
            return RunOutcome::Completed;
        }
    };
    debug!(mode = ?compiled.mode, "snippet compiled");

    let mut guard = deadline::arm(lua, budget, flag);
    let result = compiled
        .function
        .call::<MultiValue>(())
        .and_then(|values| match compiled.mode {
            ExecutionMode::Expression => show(lua, &values, capture),
            ExecutionMode::Statements => Ok(()),
        });
    guard.disarm();

    if flag.is_fired() {
        debug!("snippet aborted by deadline");
        return RunOutcome::DeadlineExceeded;
    }
    if let Err(e) = result {
        capture.write_err(&format_fault(&e));
    }
    RunOutcome::Completed
}

fn show(lua: &Lua, values: &MultiValue, capture: &OutputCapture) -> mlua::Result<()> {
    let tostring: Function = lua.globals().get("tostring")?;
    let values: Vec<_> = values.iter().cloned().collect();
    if let Some(line) = render::render_result(&tostring, &values)? {
        capture.write_out(&line);
        capture.write_out("\n");
    }
    Ok(())
}

/// Formats a fault for the error sink: message, traceback if any, newline.
#[must_use]
pub fn format_fault(err: &mlua::Error) -> String {
    let mut text = match err {
        mlua::Error::SyntaxError { message, .. } => format!("syntax error: {message}"),
        mlua::Error::CallbackError { traceback, cause } => {
            format!("{}\n{traceback}", root_message(cause))
        }
        other => other.to_string(),
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn root_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => root_message(cause),
        mlua::Error::ExternalError(e) => e.to_string(),
        other => other.to_string(),
    }
}
