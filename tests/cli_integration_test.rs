// Integration tests for the appma binary
// Argument validation, startup failures and a launch that ends on its own.

use std::fs;
use std::process::Command;

use tempfile::tempdir;

fn appma() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_appma"));
    // Keep the user's settings out of the way
    command.env_remove("APPMA_LOGGING_CONFIG");
    command.env_remove("APPMA_CONFIGURATION_NAME");
    command
}

#[test]
fn test_help() {
    let output = appma().arg("--help").output().expect("Failed to run appma");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--root"));
    assert!(stdout.contains("--upgrade"));
}

#[test]
fn test_conflicting_flags_fail() {
    let output = appma().args(["--verbose", "--quiet"]).output().expect("Failed to run appma");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Conflicting log level flags"));
}

#[test]
fn test_missing_root_fails() {
    let output = appma()
        .args(["--root", "/definitely/does/not/exist"])
        .output()
        .expect("Failed to run appma");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_root_without_application_fails() {
    let dir = tempdir().unwrap();
    let output = appma()
        .arg("--root")
        .arg(dir.path())
        .output()
        .expect("Failed to run appma");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No compliant application could be found"));
}

#[test]
fn test_failed_upgrade_exits_cleanly() {
    let dir = tempdir().unwrap();
    // No release has been published, so the download fails and the launcher exits
    fs::write(
        dir.path().join("providers.yaml"),
        "applications:\n  - provider: console\n    properties: { name: demo, version: '1.0' }\n\
         version_managers:\n  - provider: folder-updates\n    properties: { releases: releases }\n",
    )
    .unwrap();
    let log_file = dir.path().join("appma.log");

    let output = appma()
        .arg("--root")
        .arg(dir.path())
        .arg("--log-file")
        .arg(&log_file)
        .args(["--log-format", "json", "--upgrade"])
        .output()
        .expect("Failed to run appma");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.lines().all(|line| line.starts_with('{')));
    assert!(log.contains("Exit requested"));
}

#[test]
fn test_settings_file_configures_logging() {
    let dir = tempdir().unwrap();
    let settings = dir.path().join("settings.toml");
    fs::write(&settings, "[logging]\nconsole-level = \"error\"\nfile = \"launcher.log\"\nfile-level = \"debug\"\n").unwrap();

    let output = appma()
        .arg("--root")
        .arg(dir.path())
        .arg("--settings")
        .arg(&settings)
        .output()
        .expect("Failed to run appma");
    // Nothing to launch, but the log file was opened from the settings
    assert_eq!(output.status.code(), Some(1));
    assert!(dir.path().join("launcher.log").exists());
}
