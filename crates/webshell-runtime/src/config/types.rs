//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tracing::warn;
use webshell_auth::DEFAULT_BLOCKED_PATTERNS;

/// Default execution deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on captured output per run.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Default number of code characters kept in an audit record.
pub const DEFAULT_AUDIT_CODE_CHARS: usize = 500;

/// Main configuration structure.
///
/// # Example
///
/// ```
/// use webshell_runtime::ShellConfig;
///
/// let config = ShellConfig::default();
/// assert_eq!(config.execution.timeout, 30);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Snippet execution settings.
    pub execution: ExecutionConfig,

    /// Privileged role assignments.
    pub auth: AuthConfig,

    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl ShellConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        self.execution.merge(&other.execution);
        self.auth.merge(&other.auth);
        self.audit.merge(&other.audit);
        self.logging.merge(&other.logging);
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock budget per run, seconds. `0` disables the deadline.
    ///
    /// A value that is not a non-negative integer (or a string holding one)
    /// is logged and replaced by [`DEFAULT_TIMEOUT_SECS`].
    #[serde(deserialize_with = "lenient_timeout")]
    pub timeout: u64,

    /// Blocked substrings, in match order.
    pub blocked_patterns: Vec<String>,

    /// Cap on combined captured output.
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            blocked_patterns: DEFAULT_BLOCKED_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExecutionConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.timeout != default.timeout {
            self.timeout = other.timeout;
        }
        if other.blocked_patterns != default.blocked_patterns {
            self.blocked_patterns.clone_from(&other.blocked_patterns);
        }
        if other.max_output_bytes != default.max_output_bytes {
            self.max_output_bytes = other.max_output_bytes;
        }
    }
}

fn lenient_timeout<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
        Other(toml::Value),
    }

    let secs = match Raw::deserialize(deserializer)? {
        Raw::Secs(secs) => Some(secs),
        Raw::Text(text) => text.trim().parse().ok(),
        Raw::Other(_) => None,
    };
    Ok(secs.unwrap_or_else(|| {
        warn!(key = "execution.timeout", "invalid timeout, using default");
        DEFAULT_TIMEOUT_SECS
    }))
}

/// `[auth]` section.
///
/// Lists are additive across layers: a project config can grant the role
/// to more operators but cannot revoke a global grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub privileged_logins: Vec<String>,
    pub privileged_ids: Vec<u64>,
}

impl AuthConfig {
    fn merge(&mut self, other: &Self) {
        for login in &other.privileged_logins {
            if !self.privileged_logins.contains(login) {
                self.privileged_logins.push(login.clone());
            }
        }
        for id in &other.privileged_ids {
            if !self.privileged_ids.contains(id) {
                self.privileged_ids.push(*id);
            }
        }
    }
}

/// `[audit]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines audit file. Audit goes to the log only when unset.
    pub file: Option<PathBuf>,

    /// Number of code characters kept per record.
    pub code_chars: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            file: None,
            code_chars: DEFAULT_AUDIT_CODE_CHARS,
        }
    }
}

impl AuditConfig {
    fn merge(&mut self, other: &Self) {
        if other.file.is_some() {
            self.file.clone_from(&other.file);
        }
        if other.code_chars != DEFAULT_AUDIT_CODE_CHARS {
            self.code_chars = other.code_chars;
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when neither `--debug` nor `RUST_LOG` is set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        if other.level != Self::default().level {
            self.level.clone_from(&other.level);
        }
    }
}
