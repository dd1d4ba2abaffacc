//! Integration tests for default log-to-file behavior.
//!
//! Verifies that running the CLI without --quiet writes logs to the default
//! file path under the platform state directory.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// $XDG_STATE_HOME/snapverify, then the workspace's path segments.
fn expected_log_path(state_home: &Path, workspace: &Path) -> PathBuf {
    let canonical = workspace.canonicalize().unwrap();
    let mut base = state_home.join("snapverify");
    for component in canonical.components() {
        if let Component::Normal(name) = component {
            base = base.join(name);
        }
    }
    base.join("snapverify.log")
}

struct Env {
    _temp: TempDir,
    state_home: PathBuf,
    home: PathBuf,
    workspace: PathBuf,
}

fn env() -> Env {
    let temp = TempDir::new().unwrap();
    let state_home = temp.path().join("state");
    let home = temp.path().join("home");
    let workspace = temp.path().join("ws");
    for dir in [&state_home, &home, &workspace] {
        fs::create_dir_all(dir).unwrap();
    }
    Env {
        _temp: temp,
        state_home,
        home,
        workspace,
    }
}

fn clean_command(env: &Env) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_snapverify"));
    cmd.env("XDG_STATE_HOME", &env.state_home)
        .env("XDG_CONFIG_HOME", env.home.join(".config"))
        .env("HOME", &env.home)
        .env_remove("SNAPVERIFY_LOG_FILE")
        .env_remove("SNAPVERIFY_LOG_OUTPUT")
        .current_dir(&env.workspace)
        .arg("--workspace")
        .arg(&env.workspace);
    cmd
}

#[test]
fn test_default_logging_writes_to_file() {
    let env = env();
    let output = clean_command(&env).arg("clean").output().unwrap();

    assert!(
        output.status.success(),
        "snapverify clean should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );

    let log_path = expected_log_path(&env.state_home, &env.workspace);
    assert!(
        log_path.exists(),
        "log file should exist at {}",
        log_path.display()
    );
    let content = fs::read_to_string(&log_path).unwrap();
    assert!(
        content.contains("snapverify starting"),
        "log file should contain the startup message; got: {}",
        content.lines().next().unwrap_or("")
    );
}

#[test]
fn test_verbose_logging_mirrors_to_stderr_and_file() {
    let env = env();
    let output = clean_command(&env)
        .arg("--verbose")
        .arg("clean")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "snapverify --verbose clean should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("snapverify starting"),
        "verbose mode should emit logs to stderr"
    );
    assert!(expected_log_path(&env.state_home, &env.workspace).exists());
}

#[test]
fn test_quiet_writes_no_log_file() {
    let env = env();
    let output = clean_command(&env)
        .arg("--quiet")
        .arg("clean")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(!expected_log_path(&env.state_home, &env.workspace).exists());
}
