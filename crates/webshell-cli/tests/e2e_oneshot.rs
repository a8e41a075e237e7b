//! E2E tests for one-shot mode (`webshell CODE...`).

mod common;

use common::{webshell_cmd, webshell_cmd_in, write_project_config};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

#[test]
fn expression_prints_value() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.arg("2+2").assert().success().stdout("4\n");
}

#[test]
fn statements_print_only_their_output() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.args(["x = 20;", "print(x + 1)"])
        .assert()
        .success()
        .stdout("21\n");
}

#[test]
fn runtime_fault_is_output_not_failure() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.arg("error('boom')")
        .assert()
        .success()
        .stderr(contains("error:").not())
        .stdout(contains("boom"));
}

#[test]
fn safe_mode_appends_notice() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.args(["--safe", "env.note:create({name = 'x'})"])
        .assert()
        .success()
        .stdout(contains("SAFE MODE: Transaction rolled back automatically."));
}

#[test]
fn unprivileged_login_is_denied() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.args(["--login", "guest", "--id", "7", "1"])
        .assert()
        .code(77)
        .stdout("")
        .stderr(contains("access denied"));
}

#[test]
fn blocked_pattern_is_rejected() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.arg("os.execute('ls')")
        .assert()
        .code(65)
        .stderr(contains("os.execute"));
}

#[test]
fn infinite_loop_hits_deadline() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.args(["--timeout", "1", "while true do end"])
        .assert()
        .code(124)
        .stderr(contains("time limit"));
}

#[test]
fn project_config_grants_role_and_blocklist() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_project_config(
        dir.path(),
        "[auth]\nprivileged_logins = [\"ops\"]\n\n[execution]\nblocked_patterns = [\"forbidden\"]\n",
    );

    webshell_cmd_in(dir.path())
        .args(["--login", "ops", "--id", "5", "forbidden_name = 1"])
        .assert()
        .code(65)
        .stderr(contains("forbidden"));

    webshell_cmd_in(dir.path())
        .args(["--login", "ops", "--id", "5", "1 + 1"])
        .assert()
        .success()
        .stdout("2\n");

    webshell_cmd_in(dir.path())
        .arg("1")
        .assert()
        .code(77);
}

#[test]
fn audit_file_receives_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_project_config(dir.path(), "[audit]\nfile = \"audit.jsonl\"\n");

    webshell_cmd_in(dir.path()).arg("1").assert().success();

    let trail = std::fs::read_to_string(dir.path().join("audit.jsonl")).expect("audit file");
    let kinds: Vec<String> = trail
        .lines()
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).expect("json line");
            record["event"]["kind"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(kinds, ["attempt", "completed"]);
}
