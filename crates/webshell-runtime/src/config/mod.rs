//! Configuration management with hierarchical layering.
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────────┐
//! │  0. ParameterStore (runtime, per call)      │  Live override
//! ├─────────────────────────────────────────────┤
//! │  1. Environment Variables (WEBSHELL_*)      │  Process override
//! ├─────────────────────────────────────────────┤
//! │  2. Project Config (.webshell/config.toml)  │  Project-specific
//! ├─────────────────────────────────────────────┤
//! │  3. Global Config (~/.webshell/config.toml) │  User defaults
//! ├─────────────────────────────────────────────┤
//! │  4. Default Values (compile-time)           │  Fallback
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [execution]
//! timeout = 30
//! blocked_patterns = ["os.execute", "io.popen", "subprocess", "os.remove", "require"]
//! max_output_bytes = 1048576
//!
//! [auth]
//! privileged_logins = ["admin"]
//! privileged_ids = [2]
//!
//! [audit]
//! file = "/var/log/webshell/audit.jsonl"
//! code_chars = 500
//!
//! [logging]
//! level = "warn"
//! ```

mod capability;
mod error;
mod loader;
mod types;

pub use capability::{
    execution_blocklist, execution_max_output, execution_timeout, ConfigCapability,
    ParameterStore, BLOCKED_PATTERNS_KEY, MAX_OUTPUT_KEY, TIMEOUT_KEY,
};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{
    AuditConfig, AuthConfig, ExecutionConfig, LoggingConfig, ShellConfig,
    DEFAULT_AUDIT_CODE_CHARS, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS,
};

/// Project-local config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".webshell";

/// Config file name inside config directories.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(PROJECT_CONFIG_DIR)
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join(PROJECT_CONFIG_FILE)
}
