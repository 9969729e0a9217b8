//! Black-box tests of the `dbload` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dbload(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dbload").expect("binary built");
    cmd.current_dir(dir.path())
        .env_remove("DBLOAD_DATABASE_PATH")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn ddl_prints_create_table() {
    let dir = tempfile::tempdir().unwrap();
    dbload(&dir)
        .arg("ddl")
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE IF NOT EXISTS load_test"));
}

#[test]
fn ddl_json_output_is_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let output = dbload(&dir).args(["ddl", "--json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["backend"], "sqlite");
    assert!(value["ddl"].as_str().unwrap().contains("load_test"));
}

#[test]
fn check_config_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.toml");
    std::fs::write(&path, "[workload]\nthreads = 4\n\n[pool]\nmin_size = 1\nmax_size = 2\n").unwrap();

    dbload(&dir)
        .args(["check", "config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("below the worker count"));
}

#[test]
fn check_config_returns_nonzero_on_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.toml");
    std::fs::write(&path, "[reporting]\nsub_second_window_ms = 5000\n").unwrap();

    dbload(&dir)
        .args(["check", "config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sub_second_window_ms"));
}

#[test]
fn check_config_picks_up_default_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dbload.toml"), "[workload]\nthreads = 0\n").unwrap();

    dbload(&dir)
        .args(["check", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threads"));
}

#[test]
fn run_rejects_unknown_mode() {
    let dir = tempfile::tempdir().unwrap();
    dbload(&dir)
        .args(["run", "--mode", "upsert"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("upsert"));
}

#[test]
fn short_run_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    dbload(&dir)
        .args([
            "--color",
            "never",
            "run",
            "--database",
            "load.db",
            "--threads",
            "2",
            "--duration",
            "1",
            "--warmup",
            "0",
            "--min-pool",
            "1",
            "--max-pool",
            "2",
            "--mode",
            "insert-only",
            "-o",
            "report.json",
        ])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .success()
        .stdout(predicate::str::contains("Load test complete"));

    let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(value["backend"], "sqlite");
    assert_eq!(value["mode"], "insert-only");
    assert_eq!(value["threads"], 2);
    assert!(value["stats"]["inserts"].as_u64().unwrap() > 0);
    assert!(dir.path().join("load.db").exists());
}

#[test]
fn short_run_writes_csv_report() {
    let dir = tempfile::tempdir().unwrap();
    dbload(&dir)
        .args([
            "--color",
            "never",
            "run",
            "--database",
            "load.db",
            "--threads",
            "1",
            "--duration",
            "1",
            "--warmup",
            "0",
            "--min-pool",
            "1",
            "--max-pool",
            "1",
            "--mode",
            "insert-only",
            "-o",
            "report.csv",
            "--output-format",
            "csv",
        ])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .success();

    let report = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "# Configuration");
    assert!(lines.contains(&"# backend,sqlite"));
    assert!(lines.contains(&"# mode,insert-only"));
    assert!(lines.contains(&"# Final Statistics"));
}
