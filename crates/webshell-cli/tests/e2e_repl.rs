//! E2E tests for the interactive loop, driven through stdin.

mod common;

use common::webshell_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

#[test]
fn empty_stdin_exits_gracefully() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.write_stdin("").assert().success();
}

#[test]
fn quit_stops_processing() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.write_stdin(":quit\nprint('after')\n")
        .assert()
        .success()
        .stdout(contains("after").not());
}

#[test]
fn variables_survive_between_lines() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.write_stdin("x = 40\nx + 2\n:vars\n")
        .assert()
        .success()
        .stdout(contains("42\n"))
        .stdout(contains("x = 40"));
}

#[test]
fn reset_forgets_variables() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.write_stdin("y = 1\n:reset\n:vars\n")
        .assert()
        .success()
        .stdout(contains("session cleared"))
        .stdout(contains("(no variables)"));
}

#[test]
fn profile_prints_report() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.write_stdin(":profile env.note:create({name = 'a'})\n")
        .assert()
        .success()
        .stdout(contains("\"total_queries\": 1"))
        .stdout(contains("INSERT"));
}

#[test]
fn errors_do_not_end_the_session() {
    let (mut cmd, _guard) = webshell_cmd();
    cmd.write_stdin(":bogus\nrequire('x')\n7 * 6\n")
        .assert()
        .success()
        .stderr(contains("unknown command"))
        .stderr(contains("blocked"))
        .stdout(contains("42\n"));
}
