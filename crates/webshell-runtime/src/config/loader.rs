//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.webshell/config.toml`)
//! 3. Project config (`.webshell/config.toml`)
//! 4. Environment variables (`WEBSHELL_*`)
//!
//! Each layer overrides the previous.

use super::{default_config_path, ConfigError, ShellConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use webshell_runtime::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/srv/app")
///     .skip_env_vars()
///     .load()
///     .expect("config");
/// assert!(config.execution.timeout > 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.webshell/config.toml).
    global_config_path: Option<PathBuf>,

    /// Project root directory.
    project_root: Option<PathBuf>,

    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config will be loaded from `<project_root>/.webshell/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed.
    /// Missing config files are silently ignored, and a malformed
    /// `WEBSHELL_TIMEOUT` is logged and skipped.
    pub fn load(&self) -> Result<ShellConfig, ConfigError> {
        let mut config = ShellConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_config) = self.load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let project_config_path = project_root
                    .join(PROJECT_CONFIG_DIR)
                    .join(PROJECT_CONFIG_FILE);

                if let Some(project_config) = self.load_file(&project_config_path)? {
                    debug!(
                        path = %project_config_path.display(),
                        "Loaded project config"
                    );
                    config.merge(&project_config);
                }
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config);
        }

        Ok(config)
    }

    /// Loads a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<ShellConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let config =
            ShellConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

        Ok(Some(config))
    }
}

/// Applies `WEBSHELL_*` environment overrides.
///
/// | Variable | Field |
/// |----------|-------|
/// | `WEBSHELL_TIMEOUT` | `execution.timeout` |
/// | `WEBSHELL_BLOCKED_PATTERNS` | `execution.blocked_patterns` (comma-separated) |
/// | `WEBSHELL_AUDIT_FILE` | `audit.file` |
fn apply_env_vars(config: &mut ShellConfig) {
    if let Ok(val) = std::env::var("WEBSHELL_TIMEOUT") {
        match val.trim().parse() {
            Ok(secs) => config.execution.timeout = secs,
            Err(_) => warn!(
                var = "WEBSHELL_TIMEOUT",
                value = %val,
                kept = config.execution.timeout,
                "invalid timeout, ignoring"
            ),
        }
    }

    if let Ok(val) = std::env::var("WEBSHELL_BLOCKED_PATTERNS") {
        config.execution.blocked_patterns = webshell_auth::Blocklist::from_config_value(&val)
            .patterns()
            .to_vec();
    }

    if let Ok(val) = std::env::var("WEBSHELL_AUDIT_FILE") {
        config.audit.file = Some(PathBuf::from(val));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .skip_env_vars()
            .load()
            .expect("load");

        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    fn load_global_config() {
        let temp = TempDir::new().expect("tempdir");
        let config_path = create_config_file(
            temp.path(),
            r#"
[execution]
timeout = 3

[auth]
privileged_logins = ["admin"]
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&config_path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .expect("load");

        assert_eq!(config.execution.timeout, 3);
        assert_eq!(config.auth.privileged_logins, vec!["admin"]);
    }

    #[test]
    fn project_overrides_global() {
        let global_temp = TempDir::new().expect("tempdir");
        let project_temp = TempDir::new().expect("tempdir");
        let dot_dir = project_temp.path().join(".webshell");
        std::fs::create_dir_all(&dot_dir).expect("mkdir");

        let global_path = create_config_file(
            global_temp.path(),
            r#"
[execution]
timeout = 3
max_output_bytes = 100
"#,
        );
        create_config_file(
            &dot_dir,
            r#"
[execution]
timeout = 9
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project_temp.path())
            .skip_env_vars()
            .load()
            .expect("load");

        assert_eq!(config.execution.timeout, 9);
        assert_eq!(config.execution.max_output_bytes, 100);
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_project_root("/nonexistent/project")
            .skip_env_vars()
            .load()
            .expect("load");

        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = create_config_file(temp.path(), "[execution\ntimeout = ");

        let err = ConfigLoader::new()
            .with_global_config(&path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn env_var_override_and_malformed_timeout() {
        // Only this test touches WEBSHELL_* variables.
        std::env::set_var("WEBSHELL_TIMEOUT", "7");
        std::env::set_var("WEBSHELL_BLOCKED_PATTERNS", "load, dofile");

        let result = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::set_var("WEBSHELL_TIMEOUT", "soon");
        let bad = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::remove_var("WEBSHELL_TIMEOUT");
        std::env::remove_var("WEBSHELL_BLOCKED_PATTERNS");

        let config = result.expect("load");
        assert_eq!(config.execution.timeout, 7);
        assert_eq!(config.execution.blocked_patterns, vec!["load", "dofile"]);
        assert_eq!(bad.expect("malformed timeout is not fatal").execution.timeout, 30);
    }
}
