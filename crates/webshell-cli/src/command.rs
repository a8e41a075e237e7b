//! REPL line parsing.
//!
//! A line that does not start with `:` is a snippet. Meta commands:
//!
//! | Input | Command |
//! |-------|---------|
//! | `:safe CODE` | execute `CODE` in safe mode |
//! | `:profile CODE` | profile `CODE` |
//! | `:vars` | list session variables |
//! | `:reset` | drop the session |
//! | `:help` | print usage |
//! | `:quit`, `:q` | exit |

use thiserror::Error;

pub const HELP: &str = "\
Enter Lua code to run it in your session. Expressions print their value.

  :safe CODE      run CODE and roll back every write it made
  :profile CODE   run CODE in isolation and report its queries
  :vars           list session variables
  :reset          forget all session variables
  :help           show this help
  :quit           exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Execute { code: String, safe: bool },
    Profile(String),
    Vars,
    Reset,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command ':{0}' (try :help)")]
    Unknown(String),

    #[error("usage: :{0} CODE")]
    MissingCode(&'static str),

    #[error(":{0} takes no arguments")]
    UnexpectedArgument(&'static str),
}

/// Parses one input line.
///
/// # Errors
///
/// Returns [`ParseError`] for unknown meta commands or missing/extra arguments.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }

    // `::label::` is Lua, not a meta command.
    let meta = match trimmed.strip_prefix(':') {
        Some(meta) if !meta.starts_with(':') => meta,
        _ => {
            return Ok(Command::Execute {
                code: line.to_string(),
                safe: false,
            })
        }
    };

    let (name, rest) = match meta.find(char::is_whitespace) {
        Some(pos) => (&meta[..pos], meta[pos..].trim()),
        None => (meta, ""),
    };

    match name {
        "safe" => code_arg("safe", rest).map(|code| Command::Execute { code, safe: true }),
        "profile" => code_arg("profile", rest).map(Command::Profile),
        "vars" => no_arg("vars", rest, Command::Vars),
        "reset" => no_arg("reset", rest, Command::Reset),
        "help" | "h" => no_arg("help", rest, Command::Help),
        "quit" | "q" | "exit" => no_arg("quit", rest, Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn code_arg(name: &'static str, rest: &str) -> Result<String, ParseError> {
    if rest.is_empty() {
        Err(ParseError::MissingCode(name))
    } else {
        Ok(rest.to_string())
    }
}

fn no_arg(name: &'static str, rest: &str, command: Command) -> Result<Command, ParseError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::UnexpectedArgument(name))
    }
}
