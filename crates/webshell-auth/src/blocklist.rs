//! Code blocklist.
//!
//! An ordered set of literal substrings. Submitted code containing any of
//! them is rejected before execution. The check is a coarse tripwire, not a
//! sandbox: the execution context already omits `os.execute`, `io` and
//! `require`, and the blocklist additionally records intent.

use serde::{Deserialize, Serialize};

/// Patterns used when configuration supplies none.
///
/// | Category | Pattern |
/// |----------|---------|
/// | system exec | `os.execute` |
/// | process spawn | `io.popen` |
/// | subprocess | `subprocess` |
/// | recursive delete | `os.remove` |
/// | dynamic import | `require` |
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] =
    &["os.execute", "io.popen", "subprocess", "os.remove", "require"];

/// Ordered literal substring patterns.
///
/// Matching is case-sensitive and the first pattern in configured order
/// that occurs in the code is reported.
///
/// # Example
///
/// ```
/// use webshell_auth::Blocklist;
///
/// let list = Blocklist::from_config_value("os.execute, io.popen");
/// assert_eq!(list.first_match("io.popen('ls')"), Some("io.popen"));
/// assert_eq!(list.first_match("print(1)"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocklist {
    patterns: Vec<String>,
}

impl Blocklist {
    /// Creates a blocklist from explicit patterns. Empty patterns are dropped.
    #[must_use]
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Parses the comma-separated configuration value.
    ///
    /// Entries are trimmed and empty entries skipped. A value with no
    /// usable entry yields the default set.
    #[must_use]
    pub fn from_config_value(value: &str) -> Self {
        let patterns: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();

        if patterns.is_empty() {
            Self::default()
        } else {
            Self { patterns }
        }
    }

    /// Returns the first pattern (in configured order) contained in `code`.
    #[must_use]
    pub fn first_match(&self, code: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| code.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Returns `true` if `code` contains any pattern.
    #[must_use]
    pub fn is_blocked(&self, code: &str) -> bool {
        self.first_match(code).is_some()
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for Blocklist {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_PATTERNS.iter().copied())
    }
}
