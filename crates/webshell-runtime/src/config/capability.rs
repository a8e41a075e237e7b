//! String-keyed configuration capability.
//!
//! The engine reads its per-call settings through [`ConfigCapability`]
//! rather than a typed struct, so a host can back it with a runtime
//! parameter table and change settings without restarting.
//!
//! # Keys
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `execution.timeout` | deadline, integer seconds | `30` |
//! | `execution.blocked_patterns` | comma-separated patterns | built-in set |
//! | `execution.max_output_bytes` | output cap | `1048576` |

use super::types::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS};
use super::ShellConfig;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use webshell_auth::Blocklist;

pub const TIMEOUT_KEY: &str = "execution.timeout";
pub const BLOCKED_PATTERNS_KEY: &str = "execution.blocked_patterns";
pub const MAX_OUTPUT_KEY: &str = "execution.max_output_bytes";

/// Key/value configuration lookup.
pub trait ConfigCapability: Send + Sync {
    /// Returns the value for `key`, or `default` when unset.
    fn get(&self, key: &str, default: &str) -> String;
}

impl ConfigCapability for ShellConfig {
    fn get(&self, key: &str, default: &str) -> String {
        match key {
            TIMEOUT_KEY => self.execution.timeout.to_string(),
            BLOCKED_PATTERNS_KEY => self.execution.blocked_patterns.join(","),
            MAX_OUTPUT_KEY => self.execution.max_output_bytes.to_string(),
            _ => default.to_string(),
        }
    }
}

/// Runtime-mutable parameter table.
///
/// Values set here win; unset keys fall through to the optional base
/// capability (usually the loaded [`ShellConfig`]).
///
/// # Example
///
/// ```
/// use webshell_runtime::{ConfigCapability, ParameterStore};
///
/// let params = ParameterStore::new();
/// assert_eq!(params.get("execution.timeout", "30"), "30");
/// params.set("execution.timeout", "5");
/// assert_eq!(params.get("execution.timeout", "30"), "5");
/// ```
#[derive(Default)]
pub struct ParameterStore {
    values: RwLock<BTreeMap<String, String>>,
    base: Option<Arc<dyn ConfigCapability>>,
}

impl ParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers the store over `base`.
    #[must_use]
    pub fn with_base(base: Arc<dyn ConfigCapability>) -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            base: Some(base),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

impl ConfigCapability for ParameterStore {
    fn get(&self, key: &str, default: &str) -> String {
        if let Some(value) = self.values.read().get(key) {
            return value.clone();
        }
        match &self.base {
            Some(base) => base.get(key, default),
            None => default.to_string(),
        }
    }
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("values", &*self.values.read())
            .field("layered", &self.base.is_some())
            .finish()
    }
}

/// Reads the execution deadline.
///
/// A malformed value falls back to 30 seconds with a warning.
#[must_use]
pub fn execution_timeout(config: &dyn ConfigCapability) -> Duration {
    let default = DEFAULT_TIMEOUT_SECS.to_string();
    let raw = config.get(TIMEOUT_KEY, &default);
    let secs = raw.trim().parse::<u64>().unwrap_or_else(|_| {
        warn!(key = TIMEOUT_KEY, value = %raw, "invalid timeout, using default");
        DEFAULT_TIMEOUT_SECS
    });
    Duration::from_secs(secs)
}

/// Reads the blocklist. An empty value yields the built-in set.
#[must_use]
pub fn execution_blocklist(config: &dyn ConfigCapability) -> Blocklist {
    Blocklist::from_config_value(&config.get(BLOCKED_PATTERNS_KEY, ""))
}

/// Reads the output cap. A malformed value falls back to the default.
#[must_use]
pub fn execution_max_output(config: &dyn ConfigCapability) -> usize {
    let default = DEFAULT_MAX_OUTPUT_BYTES.to_string();
    let raw = config.get(MAX_OUTPUT_KEY, &default);
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(key = MAX_OUTPUT_KEY, value = %raw, "invalid output cap, using default");
        DEFAULT_MAX_OUTPUT_BYTES
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_config_answers_known_keys() {
        let config = ShellConfig::default();
        assert_eq!(config.get(TIMEOUT_KEY, "x"), "30");
        assert_eq!(
            config.get(BLOCKED_PATTERNS_KEY, ""),
            "os.execute,io.popen,subprocess,os.remove,require"
        );
        assert_eq!(config.get("unknown.key", "fallback"), "fallback");
    }

    #[test]
    fn malformed_timeout_falls_back_to_default() {
        let params = ParameterStore::new();
        params.set(TIMEOUT_KEY, "thirty");
        assert_eq!(execution_timeout(&params), Duration::from_secs(30));

        params.set(TIMEOUT_KEY, "-1");
        assert_eq!(execution_timeout(&params), Duration::from_secs(30));
    }

    #[test]
    fn timeout_parses_seconds() {
        let params = ParameterStore::new();
        params.set(TIMEOUT_KEY, " 2 ");
        assert_eq!(execution_timeout(&params), Duration::from_secs(2));
    }

    #[test]
    fn unset_timeout_uses_default() {
        assert_eq!(execution_timeout(&ParameterStore::new()), Duration::from_secs(30));
    }

    #[test]
    fn parameters_layer_over_base() {
        let mut config = ShellConfig::default();
        config.execution.timeout = 12;
        let params = ParameterStore::with_base(Arc::new(config));

        assert_eq!(execution_timeout(&params), Duration::from_secs(12));
        params.set(TIMEOUT_KEY, "1");
        assert_eq!(execution_timeout(&params), Duration::from_secs(1));
        params.remove(TIMEOUT_KEY);
        assert_eq!(execution_timeout(&params), Duration::from_secs(12));
    }

    #[test]
    fn blocklist_from_parameters() {
        let params = ParameterStore::new();
        assert_eq!(execution_blocklist(&params), Blocklist::default());
        params.set(BLOCKED_PATTERNS_KEY, "load,dofile");
        assert_eq!(execution_blocklist(&params).patterns(), &["load", "dofile"]);
    }

    #[test]
    fn max_output_fallback() {
        let params = ParameterStore::new();
        params.set(MAX_OUTPUT_KEY, "lots");
        assert_eq!(execution_max_output(&params), DEFAULT_MAX_OUTPUT_BYTES);
        params.set(MAX_OUTPUT_KEY, "64");
        assert_eq!(execution_max_output(&params), 64);
    }
}
