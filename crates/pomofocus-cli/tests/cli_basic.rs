//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_pomofocus"))
        .args(args)
        .env("POMOFOCUS_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run a CLI command, expect success, and parse stdout as JSON.
fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("{args:?} printed non-JSON ({e}): {stdout}"))
}

/// Run `timer run` with `keys` piped to stdin and return (stdout, stderr, exit code).
fn run_foreground(data_dir: &Path, keys: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pomofocus"))
        .args(["timer", "run"])
        .env("POMOFOCUS_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(keys.as_bytes())
        .unwrap();
    let output = child.wait_with_output().expect("Failed to wait for CLI");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

#[test]
fn test_timer_status_starts_idle() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["type"], "StateSnapshot");
    assert_eq!(status["state"], "idle");
    assert_eq!(status["remaining_secs"], 1500);
}

#[test]
fn test_timer_session_is_recorded() {
    let dir = tempfile::tempdir().unwrap();

    let started = run_json(dir.path(), &["timer", "start"]);
    assert_eq!(started["type"], "SessionStarted");

    let distracted = run_json(dir.path(), &["timer", "distract"]);
    assert_eq!(distracted["type"], "DistractionLogged");
    assert_eq!(distracted["distraction_count"], 1);

    let finished = run_json(dir.path(), &["timer", "finish"]);
    assert_eq!(finished["type"], "SessionFinished");

    let history = run_json(dir.path(), &["history", "--json"]);
    let sessions = history.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["status"], "clean");
    assert_eq!(sessions[0]["distraction_count"], 1);

    // A second finish is a no-op and records nothing.
    let again = run_json(dir.path(), &["timer", "finish"]);
    assert_eq!(again["state"], "finished");
    let history = run_json(dir.path(), &["history", "--json"]);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[test]
fn test_timer_abandon_records_abandoned() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["timer", "start"]);
    let abandoned = run_json(dir.path(), &["timer", "abandon"]);
    assert_eq!(abandoned["type"], "SessionAbandoned");

    let reset = run_json(dir.path(), &["timer", "reset"]);
    assert_eq!(reset["type"], "SessionReset");

    let today = run_json(dir.path(), &["stats", "today", "--json"]);
    assert_eq!(today["total_sessions"], 1);
    assert_eq!(today["abandoned_sessions"], 1);
    assert_eq!(today["clean_sessions"], 0);
}

#[test]
fn test_invalid_transitions_are_noops() {
    let dir = tempfile::tempdir().unwrap();
    for cmd in ["distract", "abandon", "finish", "reset"] {
        let out = run_json(dir.path(), &["timer", cmd]);
        assert_eq!(out["type"], "StateSnapshot", "timer {cmd}");
        assert_eq!(out["state"], "idle", "timer {cmd}");
    }
    let history = run_json(dir.path(), &["history", "--json"]);
    assert!(history.as_array().unwrap().is_empty());
}

#[test]
fn test_countdown_completes_between_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(
        dir.path(),
        &["config", "set", "timer.focus_duration_secs", "1"],
    );
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    run_json(dir.path(), &["timer", "start"]);
    std::thread::sleep(std::time::Duration::from_millis(2_100));

    let (stdout, _, code) = run_cli(dir.path(), &["timer", "status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("SessionCompleted"), "{stdout}");
    assert!(stdout.contains("\"completed\""), "{stdout}");

    let history = run_json(dir.path(), &["history", "--json"]);
    assert_eq!(history[0]["status"], "clean");
}

#[test]
fn test_foreground_shares_the_running_session() {
    let dir = tempfile::tempdir().unwrap();
    let started = run_json(dir.path(), &["timer", "start"]);

    // Starting again in the foreground is refused; the parked session keeps running.
    let (_, stderr, code) = run_foreground(dir.path(), "\nq\n");
    assert_eq!(code, 0, "{stderr}");
    assert!(stderr.contains("already in progress"), "{stderr}");
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["state"], "running");
    assert_eq!(status["started_at"], started["at"]);

    // Upper-case keys work; the finish is rendered before quitting.
    let (stdout, stderr, code) = run_foreground(dir.path(), "D\nF\nq\n");
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("SessionFinished"), "{stdout}");
    assert!(
        stdout.contains("You completed the session with 1 distraction."),
        "{stdout}"
    );

    let again = run_json(dir.path(), &["timer", "finish"]);
    assert_eq!(again["state"], "finished");

    let history = run_json(dir.path(), &["history", "--json"]);
    let sessions = history.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["distraction_count"], 1);
}

#[test]
fn test_foreground_abandon_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_foreground(dir.path(), "s\na\nq\n");
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("SessionAbandoned"), "{stdout}");
    assert!(stdout.contains("The session was abandoned."), "{stdout}");

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["state"], "abandoned");
    let history = run_json(dir.path(), &["history", "--json"]);
    assert_eq!(history[0]["status"], "abandoned");
}

#[test]
fn test_stats_views() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(dir.path(), &["stats", "today", "--json"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "null");

    let week = run_json(dir.path(), &["stats", "week", "--json"]);
    let days = week["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert!(days.iter().all(|d| d["total_sessions"] == 0));
    assert_eq!(week["totals"]["days"], 7);

    let report = run_json(dir.path(), &["stats", "report", "--json"]);
    assert!(report["today"].is_null());
    assert!(report["yesterday"].is_null());
    assert_eq!(report["window"].as_array().unwrap().len(), 7);

    let (stdout, _, code) = run_cli(dir.path(), &["stats", "report"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No sessions."));
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "stats.window_days"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "7");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "stats.window_days", "14"]);
    assert_eq!(code, 0);
    let week = run_json(dir.path(), &["stats", "week", "--json"]);
    assert_eq!(week["days"].as_array().unwrap().len(), 14);

    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "{stderr}");

    let (_, stderr, code) = run_cli(
        dir.path(),
        &["config", "set", "timer.focus_duration_secs", "0"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "{stderr}");

    let (stdout, _, code) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("defaults"));
}

#[test]
fn test_completions() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pomofocus"));
}
