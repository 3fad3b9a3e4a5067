//! CLI Integration Tests for deep-research
//!
//! Tests the command-line interface: help output, the config command and
//! argument handling that never reaches a reasoning provider.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Run the built binary with `args` inside `dir`
fn run_cli(args: &[&str], dir: &TempDir) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_deep-research"))
        .args(args)
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["--help"], &dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage") || stdout.contains("USAGE"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["--version"], &dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("deep-research"));
}

#[test]
fn test_run_help_lists_options() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["run", "--help"], &dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--max-iterations"));
    assert!(stdout.contains("--step-timeout"));
    assert!(stdout.contains("--strict"));
    assert!(stdout.contains("--json"));
}

// =============================================================================
// Run Command Tests
// =============================================================================

#[test]
fn test_empty_query_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["--no-color", "run"], &dir);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Please enter a research question."));
}

#[test]
fn test_whitespace_query_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["--no-color", "run", "   "], &dir);

    assert_eq!(output.status.code(), Some(2));
}

// =============================================================================
// Config Command Tests
// =============================================================================

#[test]
fn test_config_validate_with_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        "[workflow]\nmax_iterations = 2\n\n[reference]\nenabled = false\n",
    )
    .unwrap();

    let output = run_cli(
        &["--no-color", "--config", path.to_str().unwrap(), "config", "--validate"],
        &dir,
    );

    assert!(output.status.success(), "config --validate failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration is valid"));
    assert!(stdout.contains("reference lookup is disabled"));
}

#[test]
fn test_config_without_file_shows_defaults() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["--no-color", "config"], &dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ollama"));
    assert!(stdout.contains("web_search"));
    assert!(stdout.contains("lookup_reference"));
    assert!(stdout.contains("current_datetime"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("research.toml"), "[gateway]\ntimeout_secs = 0\n").unwrap();

    let output = run_cli(&["--no-color", "config", "--validate"], &dir);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timeout_secs"));
}
