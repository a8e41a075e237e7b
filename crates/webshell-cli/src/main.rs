//! webshell - interactive Lua console for privileged operators
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`WEBSHELL_*`)
//! 3. Project config (`.webshell/config.toml` in the project root)
//! 4. Global config (`~/.webshell/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Exit status
//!
//! One-shot mode exits non-zero when the console refuses or aborts a run:
//! `77` access denied, `65` blocked pattern, `124` deadline exceeded,
//! `70` internal error. A snippet that faults still exits `0`; its fault
//! text is the output.

mod command;
mod repl;
mod shell;

use anyhow::{Context, Result};
use clap::Parser;
use command::Command;
use shell::{Overrides, Shell};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use webshell_runtime::config::default_config_dir;
use webshell_runtime::{ConfigLoader, ShellConfig};
use webshell_types::Operator;

/// webshell - interactive Lua console for privileged operators
#[derive(Parser, Debug)]
#[command(name = "webshell")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Operator login
    #[arg(long, default_value = shell::DEFAULT_ADMIN_LOGIN)]
    login: String,

    /// Operator id
    #[arg(long, default_value_t = 2)]
    id: u64,

    /// Execution deadline in seconds (overrides execution.timeout)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Run CODE in safe mode (one-shot only)
    #[arg(long)]
    safe: bool,

    /// Do not read or write the REPL history file
    #[arg(long)]
    no_history: bool,

    /// Code to execute (starts the REPL when omitted)
    #[arg(trailing_var_arg = true)]
    code: Vec<String>,
}

fn init_logging(args: &Args, config: &ShellConfig) {
    let filter = if args.debug {
        EnvFilter::new("debug,rustyline=warn")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

fn load_config(project_root: &Path) -> Result<ShellConfig> {
    ConfigLoader::new()
        .with_project_root(project_root)
        .load()
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_root = match &args.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let config = load_config(&project_root)?;

    init_logging(&args, &config);
    debug!(path = %project_root.display(), "project root");

    let operator = Operator::new(args.id, args.login.clone());
    let overrides = Overrides {
        timeout: args.timeout,
    };
    let shell = Shell::build(&config, &overrides, operator)?;

    if args.code.is_empty() {
        let history = (!args.no_history).then(|| default_config_dir().join("history"));
        return repl::run(&shell, history).await;
    }

    let code = args.code.join(" ");
    info!(safe = args.safe, "one-shot mode");
    match shell.run(Command::Execute { code, safe: args.safe }).await {
        Ok(reply) => {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{reply}")?;
            stdout.flush()?;
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(shell::exit_code(&e));
        }
    }
}
