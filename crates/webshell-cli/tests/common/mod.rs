//! Shared E2E test helpers for `webshell` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::Path;
use std::time::Duration;

/// Default timeout for basic CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(20);

/// Build a Command isolated from the user's home and working directory.
///
/// Returns (command, _guard); keep the guard alive for the test's duration.
pub fn webshell_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let cmd = webshell_cmd_in(tmp.path());
    (cmd, tmp)
}

/// Build a Command whose home and project root are `dir`.
pub fn webshell_cmd_in(dir: &Path) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("webshell");
    cmd.timeout(TIMEOUT_BASIC);
    cmd.env("HOME", dir);
    cmd.env_remove("RUST_LOG");
    cmd.current_dir(dir);
    cmd.arg("--no-history");
    cmd
}

/// Writes `.webshell/config.toml` under `dir`.
pub fn write_project_config(dir: &Path, toml: &str) {
    let config_dir = dir.join(".webshell");
    std::fs::create_dir_all(&config_dir).expect("create config dir");
    std::fs::write(config_dir.join("config.toml"), toml).expect("write config");
}
