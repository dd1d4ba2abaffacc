//! CLI integration: run the binary against a rig workspace.

use crate::integration::test_utils::{write_script, Rig};
use std::fs;
use std::process::{Command, Output};

fn snapverify(rig: &Rig, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snapverify"))
        .env("HOME", &rig.root)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("SNAPVERIFY_ENV")
        .current_dir(&rig.root)
        .arg("--quiet")
        .arg("--workspace")
        .arg(&rig.root)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_verify_json_reports_three_passes() {
    let rig = Rig::new();
    rig.write_workspace_config();
    let output = snapverify(&rig, &["verify", "--format", "json"]);

    assert!(
        output.status.success(),
        "verify failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["command"], "verify");
    assert_eq!(report["exit_code"], 0);
    let outcomes = report["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o["outcome"] == "PASS"));
    assert_eq!(report["records"][2]["artifact"], "pickle_tmp2");
    assert!(rig.leftover_artifacts().is_empty());
}

#[test]
fn test_verify_text_mismatch_exits_one() {
    let rig = Rig::new();
    let config_path = rig.write_workspace_config();
    let body = fs::read_to_string(&config_path)
        .unwrap()
        .replace("bin/load\"", "bin/load-noop\"");
    fs::write(&config_path, body).unwrap();

    let output = snapverify(&rig, &["verify"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("MISMATCH"));
    assert!(stdout.contains("Run failed"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("discrepancy"));
    assert!(rig.leftover_artifacts().is_empty());
}

#[test]
fn test_stress_with_seed_override() {
    let rig = Rig::new();
    rig.write_workspace_config();
    let output = snapverify(&rig, &["stress", "--seed", "99", "--format", "json"]);

    assert!(
        output.status.success(),
        "stress failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["command"], "stress");
    assert!(!rig.stress_log().is_empty());
}

#[test]
fn test_child_output_stays_out_of_json_report() {
    let rig = Rig::new();
    rig.write_workspace_config();
    write_script(
        &rig.tool("racer"),
        "#!/bin/sh\necho \"racer: starting $3 workers\"\nmkdir -p \"$1/stress_$$\"\n",
    );
    write_script(
        &rig.tool("fake-fs"),
        "#!/bin/sh\necho \"serving $1\"\nwhile [ ! -e \"$1.unmounted\" ]; do sleep 0.05; done\nrm -f \"$1.unmounted\"\nexit 0\n",
    );
    let output = snapverify(&rig, &["stress", "--format", "json"]);

    assert!(
        output.status.success(),
        "stress failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["command"], "stress");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("racer: starting"));
    assert!(stderr.contains("serving"));
}

#[test]
fn test_mount_check_exits_zero() {
    let rig = Rig::new();
    rig.write_workspace_config();
    let output = snapverify(&rig, &["mount-check"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Exit code: 0"));
}

#[test]
fn test_mount_check_propagates_service_exit_code() {
    let rig = Rig::new();
    let config_path = rig.write_workspace_config();
    write_script(
        &rig.bin.join("fake-fs"),
        "#!/bin/sh\nwhile [ ! -e \"$1.unmounted\" ]; do sleep 0.05; done\nrm -f \"$1.unmounted\"\nexit 4\n",
    );
    assert!(config_path.exists());

    let output = snapverify(&rig, &["mount-check"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_usage_check_passes_for_conforming_service() {
    let rig = Rig::new();
    rig.write_workspace_config();
    let output = snapverify(&rig, &["usage-check"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage contract holds"));
}

#[test]
fn test_clean_removes_prefixed_entries() {
    let rig = Rig::new();
    rig.write_workspace_config();
    let dir = rig.root.join("scratch");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("junk0"), "x").unwrap();
    fs::write(dir.join("junk1"), "x").unwrap();
    fs::write(dir.join("keep"), "x").unwrap();

    let output = snapverify(
        &rig,
        &["clean", "--prefix", "junk", "--dir", dir.to_str().unwrap()],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed 2 entries"));
    assert!(dir.join("keep").exists());
    assert!(!dir.join("junk0").exists());
}

#[test]
fn test_clean_refuses_root_prefix() {
    let rig = Rig::new();
    rig.write_workspace_config();
    let output = snapverify(&rig, &["clean", "--prefix", "/"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Refusing unsafe cleanup request"));
}

#[test]
fn test_invalid_config_is_rejected_before_running() {
    let rig = Rig::new();
    let config_path = rig.write_workspace_config();
    let body = fs::read_to_string(&config_path)
        .unwrap()
        .replace("rounds = { low = 1, high = 2 }", "rounds = { low = 3, high = 3 }");
    fs::write(&config_path, body).unwrap();

    let output = snapverify(&rig, &["mount-check"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Configuration error"));
    assert!(!rig.mount_path().exists());
}
