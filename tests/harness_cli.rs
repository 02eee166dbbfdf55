//! Black-box CLI tests: spawn the real `tap-harness` binary against small
//! TAP-emitting shell fixtures and check its exit code and summary line.

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn s1_clean_run_exits_zero() {
    Command::cargo_bin("tap-harness")
        .unwrap()
        .arg(fixture("simple_pass.sh"))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn s2_one_failure_is_reported_and_exits_nonzero() {
    Command::cargo_bin("tap-harness")
        .unwrap()
        .arg(fixture("one_fail.sh"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAILED 2"));
}

#[test]
fn s3_skip_all_exits_zero_with_reason() {
    Command::cargo_bin("tap-harness")
        .unwrap()
        .arg(fixture("skip_all.sh"))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("skipped (no hardware present)"));
}

#[test]
fn s4_bail_out_aborts() {
    Command::cargo_bin("tap-harness")
        .unwrap()
        .arg(fixture("bail_out.sh"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("aborted (Bailed Out)"));
}

#[test]
fn json_flag_emits_parseable_summary() {
    Command::cargo_bin("tap-harness")
        .unwrap()
        .args(["--json", &fixture("simple_pass.sh")])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("\"verdict\""));
}

#[test]
fn list_mode_resolves_and_runs_named_tests() {
    let build_dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixture("simple_pass.sh"), build_dir.path().join("widget.t")).unwrap();
    std::fs::copy(fixture("one_fail.sh"), build_dir.path().join("gadget.t")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for name in ["widget.t", "gadget.t"] {
            let path = build_dir.path().join(name);
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
        }
    }

    let list_path = build_dir.path().join("tests.list");
    std::fs::write(&list_path, "widget\ngadget\n").unwrap();

    Command::cargo_bin("tap-harness")
        .unwrap()
        .args(["-l", "-b", build_dir.path().to_str().unwrap(), list_path.to_str().unwrap()])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("widget"))
        .stdout(predicate::str::contains("gadget"))
        .stdout(predicate::str::contains("5 run"));
}

#[test]
fn list_mode_counts_a_crashed_child_as_aborted_even_with_clean_tap_output() {
    let build_dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixture("simple_pass.sh"), build_dir.path().join("widget.t")).unwrap();
    std::fs::copy(fixture("ok_but_crashes.sh"), build_dir.path().join("gremlin.t")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for name in ["widget.t", "gremlin.t"] {
            let path = build_dir.path().join(name);
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
        }
    }

    let list_path = build_dir.path().join("tests.list");
    std::fs::write(&list_path, "widget\ngremlin\n").unwrap();

    Command::cargo_bin("tap-harness")
        .unwrap()
        .args(["-l", "-b", build_dir.path().to_str().unwrap(), list_path.to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1 aborted"));
}

#[test]
fn list_mode_fails_fast_on_an_unresolvable_test_name() {
    let dir = tempfile::tempdir().unwrap();
    let list_path = dir.path().join("tests.list");
    std::fs::write(&list_path, "totally-unknown-test\n").unwrap();

    Command::cargo_bin("tap-harness")
        .unwrap()
        .args(["-l", list_path.to_str().unwrap()])
        .assert()
        .failure();
}
