//! Console wiring for the binary.
//!
//! [`Shell`] owns a [`Console`] over in-memory persistence and runs each
//! command on the blocking pool. A completed non-safe run commits the
//! ambient connection, the way a request boundary would; an aborted run
//! rolls it back.

use crate::command::{Command, HELP};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use webshell_auth::RoleTable;
use webshell_lua::{Console, ConsoleError};
use webshell_runtime::config::TIMEOUT_KEY;
use webshell_runtime::{
    AuditLogger, AuditSink, Connection, FanoutAuditSink, JsonlAuditSink, MemoryPersistence,
    ParameterStore, Persistence, ShellConfig, TracingAuditSink,
};
use webshell_types::{ExecutionRequest, Operator, ProfileReport};

/// Login granted the privileged role when the config names nobody.
pub const DEFAULT_ADMIN_LOGIN: &str = "admin";

/// Command-line overrides applied on top of the loaded config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timeout: Option<u64>,
}

/// What a command produced.
#[derive(Debug)]
pub enum Reply {
    Output(String),
    Report(ProfileReport),
    Vars(Vec<(String, String)>),
    Reset(bool),
    Help,
    Quit,
    Nothing,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(text) => f.write_str(text),
            Self::Report(report) => {
                let json = serde_json::to_string_pretty(report).map_err(|_| fmt::Error)?;
                writeln!(f, "{json}")
            }
            Self::Vars(vars) if vars.is_empty() => writeln!(f, "(no variables)"),
            Self::Vars(vars) => {
                for (name, value) in vars {
                    writeln!(f, "{name} = {value}")?;
                }
                Ok(())
            }
            Self::Reset(true) => writeln!(f, "session cleared"),
            Self::Reset(false) => writeln!(f, "no session to clear"),
            Self::Help => f.write_str(HELP),
            Self::Quit | Self::Nothing => Ok(()),
        }
    }
}

pub struct Shell {
    console: Arc<Console>,
    persistence: Arc<MemoryPersistence>,
    operator: Operator,
}

impl Shell {
    /// Builds the console from the merged configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configured audit file cannot be opened.
    pub fn build(config: &ShellConfig, overrides: &Overrides, operator: Operator) -> Result<Self> {
        let mut roles = RoleTable::from_lists(
            config.auth.privileged_logins.iter().cloned(),
            config.auth.privileged_ids.iter().copied(),
        );
        if roles.is_empty() {
            debug!(login = DEFAULT_ADMIN_LOGIN, "no privileged operators configured");
            roles = roles.with_login(DEFAULT_ADMIN_LOGIN);
        }

        let params = ParameterStore::with_base(Arc::new(config.clone()));
        if let Some(timeout) = overrides.timeout {
            params.set(TIMEOUT_KEY, timeout.to_string());
        }

        let mut sinks = FanoutAuditSink::new().with(Arc::new(TracingAuditSink));
        if let Some(path) = &config.audit.file {
            let file = JsonlAuditSink::open(path)
                .with_context(|| format!("cannot open audit file {}", path.display()))?;
            sinks = sinks.with(Arc::new(file) as Arc<dyn AuditSink>);
        }
        let audit = AuditLogger::new(Arc::new(sinks)).with_code_chars(config.audit.code_chars);

        let persistence = Arc::new(MemoryPersistence::new());
        let console = Console::new(
            Arc::new(roles),
            Arc::new(params),
            Arc::clone(&persistence) as Arc<dyn Persistence>,
        )
        .with_audit(audit);

        Ok(Self {
            console: Arc::new(console),
            persistence,
            operator,
        })
    }

    #[must_use]
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Runs one command.
    ///
    /// # Errors
    ///
    /// Returns the console's error; snippet faults are part of the output.
    pub async fn run(&self, command: Command) -> Result<Reply, ConsoleError> {
        match command {
            Command::Execute { code, safe } => self.execute(code, safe).await,
            Command::Profile(code) => {
                let report = self
                    .blocking(move |console, operator| console.profile(&operator, &code))
                    .await?;
                Ok(Reply::Report(report))
            }
            Command::Vars => {
                let vars = self
                    .blocking(|console, operator| console.variables(&operator))
                    .await?;
                Ok(Reply::Vars(vars))
            }
            Command::Reset => Ok(Reply::Reset(self.console.clear_session(self.operator.id))),
            Command::Help => Ok(Reply::Help),
            Command::Quit => Ok(Reply::Quit),
            Command::Empty => Ok(Reply::Nothing),
        }
    }

    async fn execute(&self, code: String, safe: bool) -> Result<Reply, ConsoleError> {
        let request = ExecutionRequest::new(self.operator.clone(), code).with_safe_mode(safe);
        let result = self
            .blocking(move |console, _| console.execute(&request))
            .await;

        let ambient = self.persistence.ambient();
        match result {
            Ok(output) => {
                ambient.commit()?;
                Ok(Reply::Output(output.output))
            }
            Err(err) => {
                if let Err(rollback) = ambient.rollback() {
                    warn!(error = %rollback, "ambient rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ConsoleError>
    where
        T: Send + 'static,
        F: FnOnce(&Console, Operator) -> Result<T, ConsoleError> + Send + 'static,
    {
        let console = Arc::clone(&self.console);
        let operator = self.operator.clone();
        tokio::task::spawn_blocking(move || f(&console, operator))
            .await
            .map_err(|e| ConsoleError::internal(format!("console task failed: {e}")))?
    }
}

/// Process exit status for a failed one-shot run.
#[must_use]
pub fn exit_code(err: &ConsoleError) -> i32 {
    match err {
        ConsoleError::AccessDenied(_) => 77,
        ConsoleError::BlockedPattern { .. } => 65,
        ConsoleError::DeadlineExceeded { .. } => 124,
        ConsoleError::Internal(_) => 70,
    }
}
