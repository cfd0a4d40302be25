//! Basic CLI E2E tests.
//!
//! Tests invoke the CLI binary against a scratch data directory and verify
//! outputs.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_sakina-cli"))
        .args(args)
        .env("SAKINA_DATA_DIR", data_dir)
        .env_remove("SAKINA_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command {:?} failed: {}", args, stderr);
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_gate_status_defaults() {
    let dir = TempDir::new().unwrap();
    let status = run_json(dir.path(), &["gate", "status"]);
    assert_eq!(status["settings"]["enabled"], false);
    assert_eq!(status["settings"]["unlockWindowMinutes"], 30);
    assert_eq!(status["unlocked"], false);
    assert!(status["settings"]["blockedPackages"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "com.instagram.android"));
}

#[test]
fn test_gate_enable_persists() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["gate", "enable"]);
    let status = run_json(dir.path(), &["gate", "status"]);
    assert_eq!(status["settings"]["enabled"], true);
    assert!(dir.path().join("gate_settings.json").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn test_gate_update_reaches_agent_store() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["gate", "enable"]);
    assert!(dir.path().join("agent").join("agent.db").exists());
}

#[test]
fn test_gate_window() {
    let dir = TempDir::new().unwrap();
    let status = run_json(dir.path(), &["gate", "window", "60"]);
    assert_eq!(status["settings"]["unlockWindowMinutes"], 60);

    let (code, _, stderr) = run_cli(dir.path(), &["gate", "window", "45"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("15, 30 or 60"));

    let status = run_json(dir.path(), &["gate", "status"]);
    assert_eq!(status["settings"]["unlockWindowMinutes"], 60);
}

#[test]
fn test_gate_block_and_unblock() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["gate", "set-blocked", "app.a", "app.a", "app.b"]);
    let status = run_json(dir.path(), &["gate", "block", "app.c"]);
    assert_eq!(
        status["settings"]["blockedPackages"],
        serde_json::json!(["app.a", "app.b", "app.c"])
    );

    let status = run_json(dir.path(), &["gate", "unblock", "app.a"]);
    assert_eq!(
        status["settings"]["blockedPackages"],
        serde_json::json!(["app.b", "app.c"])
    );

    let (code, _, _) = run_cli(dir.path(), &["gate", "block", "  "]);
    assert_ne!(code, 0);
}

#[test]
fn test_session_complete_unlocks() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["gate", "enable"]);
    let status = run_json(dir.path(), &["session", "complete"]);
    assert_eq!(status["unlocked"], true);
    let remaining = status["remainingSeconds"].as_i64().unwrap();
    assert!(remaining > 29 * 60 && remaining <= 30 * 60);
    assert!(status["settings"]["lastPrayerCompletedAtMs"].is_i64());

    let status = run_json(dir.path(), &["gate", "reset"]);
    assert_eq!(status["unlocked"], false);
    assert_eq!(status["settings"]["enabled"], false);
}

#[test]
fn test_corrupt_settings_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gate_settings.json"), "{ broken").unwrap();
    let status = run_json(dir.path(), &["gate", "status"]);
    assert_eq!(status["settings"]["enabled"], false);
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "agent.debounce_cooldown_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "2000");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "agent.debounce_cooldown_ms", "500"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "agent.debounce_cooldown_ms"]);
    assert_eq!(stdout.trim(), "500");

    let (code, _, stderr) = run_cli(dir.path(), &["config", "get", "agent.nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_default_packages_seed_gate() {
    let dir = TempDir::new().unwrap();
    let (code, _, _) = run_cli(
        dir.path(),
        &["config", "set", "gate.default_blocked_packages", "app.only"],
    );
    assert_eq!(code, 0);
    let status = run_json(dir.path(), &["gate", "status"]);
    assert_eq!(
        status["settings"]["blockedPackages"],
        serde_json::json!(["app.only"])
    );
}

#[test]
fn test_probe_status() {
    let dir = TempDir::new().unwrap();
    let status = run_json(dir.path(), &["probe", "status"]);
    assert!(status["foregroundObservationGranted"].is_boolean());
    assert!(status["usageAccessGranted"].is_boolean());
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("sakina-cli"));
}
