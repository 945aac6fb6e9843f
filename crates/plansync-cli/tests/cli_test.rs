//! Integration tests for the `plansync` binary.
//!
//! Each test runs the real binary with `XDG_CONFIG_HOME` pointed at a
//! temporary directory so the user's config is never read or written. No
//! test reaches the network: `gh` is replaced by a path that does not exist.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const OUTLINE: &str = "\
# Widget Platform Implementation Plan

Project Goal: Ship the widget platform.

## Phase 1: Foundation

### Epic 1.1: Setup

1. **Task**: Configure environment
2. **Bug**: [#40] Fix lint config
";

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn plansync(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_plansync"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("PLANSYNC_GH_BINARY")
        .env_remove("PLANSYNC_RATE_LIMIT_MS")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run plansync binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn missing_gh(tmp: &TempDir) -> String {
    tmp.path().join("no-such-gh").display().to_string()
}

fn convert_outline(tmp: &TempDir) -> std::path::PathBuf {
    let input = tmp.path().join("plan.md");
    std::fs::write(&input, OUTLINE).unwrap();
    let dir = tmp.path().display().to_string();
    let out = plansync(
        tmp.path(),
        &[
            "convert",
            input.to_str().unwrap(),
            "--owner",
            "acme",
            "--repo",
            "widgets",
            "--dir",
            &dir,
        ],
    );
    assert!(out.status.success(), "convert failed: {}", stderr(&out));
    tmp.path().join("plan.yaml")
}

// -----------------------------------------------------------------------
// init
// -----------------------------------------------------------------------

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap();

    let first = plansync(tmp.path(), &["init"]);
    assert!(first.status.success(), "init failed: {}", stderr(&first));
    let config = tmp.path().join("plansync").join("config.toml");
    let contents = std::fs::read_to_string(&config).unwrap();
    assert!(contents.contains("gh_binary = \"gh\""));
    assert!(contents.contains("rate_limit_ms = 1000"));

    let second = plansync(tmp.path(), &["init"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("--force"));

    let forced = plansync(tmp.path(), &["init", "--force"]);
    assert!(forced.status.success());
}

// -----------------------------------------------------------------------
// convert
// -----------------------------------------------------------------------

#[test]
fn convert_writes_plan_document() {
    let tmp = TempDir::new().unwrap();
    let plan_path = convert_outline(&tmp);

    let yaml = std::fs::read_to_string(&plan_path).unwrap();
    assert!(yaml.contains("owner: acme"));
    assert!(yaml.contains("name: widgets"));
    assert!(yaml.contains("name: Widget Platform"));
    assert!(yaml.contains("title: Configure environment"));
    assert!(yaml.contains("issue_number: 40"));
}

#[test]
fn convert_reports_summary() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("plan.md");
    std::fs::write(&input, OUTLINE).unwrap();
    let dir = tmp.path().display().to_string();

    let out = plansync(
        tmp.path(),
        &["convert", input.to_str().unwrap(), "--owner", "acme", "--repo", "widgets", "--dir", &dir],
    );

    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Repository: acme/widgets"));
    assert!(text.contains("Items:      4"));
    assert!(text.contains("No issue type id for"));
}

#[test]
fn convert_missing_input_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.md");

    let out = plansync(tmp.path(), &["convert", missing.to_str().unwrap(), "--owner", "a", "--repo", "b"]);

    assert!(!out.status.success());
    assert!(stderr(&out).contains("failed to read outline"));
}

// -----------------------------------------------------------------------
// sync
// -----------------------------------------------------------------------

#[test]
fn sync_missing_plan_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");

    let out = plansync(tmp.path(), &["sync", missing.to_str().unwrap()]);

    assert!(!out.status.success());
    assert!(!tmp.path().join("absent.backup.yaml").exists());
}

#[test]
fn sync_with_dangling_parent_fails_before_backup() {
    let tmp = TempDir::new().unwrap();
    let plan_path = tmp.path().join("plan.yaml");
    std::fs::write(
        &plan_path,
        "\
version: '1.0'
project:
  name: Demo
  repository:
    owner: acme
    name: widgets
issue_types:
  task: IT_task
items:
  - id: t1
    type: task
    title: Orphan
    parent_id: ghost
",
    )
    .unwrap();
    let gh = missing_gh(&tmp);

    let out = plansync(tmp.path(), &["--gh-binary", &gh, "sync", plan_path.to_str().unwrap()]);

    assert!(!out.status.success());
    assert!(stderr(&out).contains("non-existent parent"));
    assert!(!tmp.path().join("plan.backup.yaml").exists());
}

#[test]
fn sync_without_tracker_access_fails_after_backup() {
    let tmp = TempDir::new().unwrap();
    let plan_path = tmp.path().join("plan.yaml");
    std::fs::write(
        &plan_path,
        "\
version: '1.0'
project:
  name: Demo
  repository:
    owner: acme
    name: widgets
issue_types:
  phase: IT_phase
items:
  - id: p1
    type: phase
    title: Foundation
",
    )
    .unwrap();
    let gh = missing_gh(&tmp);

    let out = plansync(
        tmp.path(),
        &["--gh-binary", &gh, "sync", plan_path.to_str().unwrap(), "--rate-limit-ms", "0"],
    );

    assert!(!out.status.success());
    assert!(stderr(&out).contains("failed to resolve repository id"));
    assert!(tmp.path().join("plan.backup.yaml").exists());
}
