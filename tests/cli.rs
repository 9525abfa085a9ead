use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn demo_runs_both_phases() {
    Command::cargo_bin("batchpool-demo")
        .unwrap()
        .args(["--threads", "4", "--iterations", "1000"])
        .assert()
        .success()
        .stderr(contains("fan-out batch took"))
        .stderr(contains("parallel-for over 1000 iterations"));
}

#[test]
fn demo_runs_single_threaded() {
    Command::cargo_bin("batchpool-demo")
        .unwrap()
        .args(["--threads", "1", "--iterations", "100"])
        .assert()
        .success()
        .stderr(contains("worker 0 filled 100 entries"));
}

#[test]
fn demo_rejects_unknown_flags() {
    Command::cargo_bin("batchpool-demo")
        .unwrap()
        .arg("--bogus")
        .assert()
        .failure();
}
