// Regression tests for the `integrate` binary: output format and exit codes.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

mod common;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

use common::{Workspace, CHAIN_SUITE, PASSING_SUITE};

fn integrate(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("integrate").unwrap();
    cmd.current_dir(ws.path()).env_remove("INTEGRATE_LOG");
    cmd
}

#[test]
fn passing_run_exits_zero() {
    let ws = Workspace::new();
    ws.write("green_test.yaml", PASSING_SUITE);

    integrate(&ws)
        .args(["run", "--color", "never"])
        .assert()
        .success()
        .stdout(contains("* Running test suite 'green'"))
        .stdout(contains("  - Running only : [  OK  ]"))
        .stdout(contains("Ran 1 tests, 1 succeeded, 0 failed, 0 skipped"));
}

#[test]
fn unexpected_failure_exits_one() {
    let ws = Workspace::new();
    ws.write("chain_test.yaml", CHAIN_SUITE);

    integrate(&ws)
        .args(["run", "-v", "1", "--color", "never"])
        .assert()
        .code(1)
        .stdout(contains("[ FAIL: exit status: Some(4) != Some(0) ]"))
        .stdout(contains("[ SKIP: Dependency ]"))
        .stdout(contains("Ran 3 tests, 1 succeeded, 1 failed, 1 skipped"));
}

#[test]
fn expected_failures_only_fail_strict_runs() {
    let ws = Workspace::new();
    ws.write(
        "xfail_test.yaml",
        "tests:\n  - name: known\n    run: \"false\"\n    expect_fail: true\n",
    );

    integrate(&ws)
        .args(["run", "--color", "never"])
        .assert()
        .success()
        .stdout(contains("[ XFAIL ]"))
        .stdout(contains("1 expected failures"));
    integrate(&ws).args(["run", "--strict"]).assert().code(1);
}

#[test]
fn cycle_is_a_configuration_error() {
    let ws = Workspace::new();
    ws.write(
        "loop_test.yaml",
        r#"
tests:
  - name: a
    run: "true"
    depends: [b]
  - name: b
    run: "true"
    depends: [a]
"#,
    );

    integrate(&ws)
        .arg("run")
        .assert()
        .code(2)
        .stderr(contains("integrate::config::dependency_cycle").and(contains("break the cycle")));
}

#[test]
fn malformed_suite_file_is_a_load_error() {
    let ws = Workspace::new();
    ws.write("bad_test.yaml", "tests:\n  - name: [unclosed\n");

    integrate(&ws)
        .arg("plan")
        .assert()
        .code(2)
        .stderr(contains("integrate::load::suite_parse"));
}

#[test]
fn plan_prints_order_without_running() {
    let ws = Workspace::new();
    ws.write(
        "order_test.yaml",
        r#"
tests:
  - name: later
    run: touch ran
    depends: [sooner]
  - name: sooner
    run: touch ran
"#,
    );

    integrate(&ws)
        .args(["plan", "--color", "never"])
        .assert()
        .success()
        .stdout(contains("1. sooner\n").and(contains("2. later [depends: sooner]\n")));
    assert!(!ws.path().join("ran").exists());

    integrate(&ws)
        .args(["plan", "--levels", "--color", "never"])
        .assert()
        .success()
        .stdout(contains("level 0: sooner\n").and(contains("level 1: later\n")));
}

#[test]
fn only_filter_and_json_output() {
    let ws = Workspace::new();
    ws.write("chain_test.yaml", CHAIN_SUITE);
    ws.write("green_test.yaml", PASSING_SUITE);

    let output = integrate(&ws)
        .args(["run", "--json", "--only", "chain.first"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["suites"].as_array().map(Vec::len), Some(1));
    assert_eq!(doc["suites"][0]["order"], serde_json::json!(["first"]));
    assert_eq!(doc["summary"]["succeeded"], 1);
}

#[test]
fn config_file_sets_directories() {
    let ws = Workspace::new();
    ws.write("suites/green_test.yaml", PASSING_SUITE);
    ws.write("integrate.yaml", "dirs: [suites]\nverbosity: 0\ncolor: never\n");

    integrate(&ws)
        .arg("run")
        .assert()
        .success()
        .stdout(contains("[  OK  ]").and(contains("Failed tests:").not()));

    ws.write("integrate.yaml", "verbosity: 9\n");
    integrate(&ws)
        .arg("run")
        .assert()
        .code(2)
        .stderr(contains("verbosity must be"));
}
