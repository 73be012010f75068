//! Smoke tests for the `edi` binary
//!
//! These tests verify:
//! - `detect` prints the provider id for a recognized project
//! - `detect` exits with code 2 when no build system is found
//!
//! Each run gets its own working directory so logs stay out of the tree.

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn edi(work: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_edi"))
        .current_dir(work.path())
        .arg("--config")
        .arg(work.path().join("cfg"))
        .args(args)
        .output()
        .expect("failed to launch edi")
}

#[test]
fn test_detect_empty_directory_is_unavailable() {
    let work = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    let output = edi(&work, &["--dir", project.path().to_str().unwrap(), "detect"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("edi: "));
}

#[test]
fn test_detect_prints_provider_id() {
    let work = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("Cargo.toml"), "").unwrap();

    let output = edi(&work, &["--dir", project.path().to_str().unwrap(), "detect"]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "cargo");
}
