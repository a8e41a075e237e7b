//! Interactive loop.
//!
//! rustyline runs on a dedicated OS thread and forwards lines over a
//! channel; the async side parses and dispatches them one at a time.

use crate::command::{self, Command};
use crate::shell::{Reply, Shell};
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error};

pub const PROMPT: &str = "webshell> ";

enum ReadlineEvent {
    Line(String),
    Eof,
}

/// Runs the REPL until `:quit` or end of input.
///
/// # Errors
///
/// Fails only if stdout cannot be written.
pub async fn run(shell: &Shell, history_path: Option<PathBuf>) -> Result<()> {
    println!(
        "webshell v{} as {} (:help for commands)",
        env!("CARGO_PKG_VERSION"),
        shell.operator()
    );

    let mut events = spawn_readline_thread(history_path);

    while let Some(event) = events.recv().await {
        let line = match event {
            ReadlineEvent::Line(line) => line,
            ReadlineEvent::Eof => break,
        };

        let command = match command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        match shell.run(command).await {
            Ok(Reply::Quit) => break,
            Ok(reply) => {
                let mut stdout = std::io::stdout().lock();
                write!(stdout, "{reply}")?;
                stdout.flush()?;
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    debug!("interactive loop finished");
    Ok(())
}

fn spawn_readline_thread(history_path: Option<PathBuf>) -> mpsc::UnboundedReceiver<ReadlineEvent> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("webshell-readline".into())
        .spawn(move || {
            let config = rustyline::Config::builder().auto_add_history(true).build();
            let mut rl = match rustyline::DefaultEditor::with_config(config) {
                Ok(editor) => editor,
                Err(e) => {
                    error!("failed to create readline editor: {e}");
                    let _ = event_tx.send(ReadlineEvent::Eof);
                    return;
                }
            };

            if let Some(path) = &history_path {
                if let Err(e) = rl.load_history(path) {
                    debug!("history load: {e} (expected on first run)");
                }
            }

            loop {
                match rl.readline(PROMPT) {
                    Ok(line) => {
                        if let Some(path) = &history_path {
                            let _ = rl.save_history(path);
                        }
                        if event_tx.send(ReadlineEvent::Line(line)).is_err() {
                            break;
                        }
                    }
                    Err(rustyline::error::ReadlineError::Interrupted) => continue,
                    Err(rustyline::error::ReadlineError::Eof) => {
                        let _ = event_tx.send(ReadlineEvent::Eof);
                        break;
                    }
                    Err(e) => {
                        error!("readline error: {e}");
                        let _ = event_tx.send(ReadlineEvent::Eof);
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        error!("failed to spawn readline thread: {e}");
    }

    event_rx
}
