//! Integration tests for the ralphex CLI.
//!
//! End-to-end runs use fake `claude`/`codex` executables placed first on
//! PATH, so no real agent is ever invoked and the marker protocol is
//! exercised over real subprocess streams.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ralphex() -> Command {
    Command::new(cargo::cargo_bin!("ralphex"))
}

/// Agent fake: answers REVIEW_DONE to review prompts, COMPLETED otherwise.
const AGENT_SCRIPT: &str = r#"#!/bin/sh
prompt=$(cat)
case "$prompt" in
  *REVIEW_DONE*) echo REVIEW_DONE ;;
  *) echo COMPLETED ;;
esac
"#;

/// Agent fake that exits without any marker.
const SILENT_AGENT_SCRIPT: &str = "#!/bin/sh\ncat > /dev/null\necho thinking...\nexit 0\n";

fn write_script(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git").args(args).current_dir(dir).status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

struct TestProject {
    _temp: TempDir,
    repo: PathBuf,
    path_env: String,
}

/// A git repo plus a bin directory with fake agents first on PATH.
fn project_with_agents(agent_script: &str) -> TestProject {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    let bin = temp.path().join("bin");
    std::fs::create_dir_all(&repo).unwrap();
    std::fs::create_dir_all(&bin).unwrap();

    write_script(&bin, "claude", agent_script);
    write_script(&bin, "codex", agent_script);

    git(&repo, &["init", "-q", "-b", "main"]);
    git(&repo, &["config", "user.email", "test@example.com"]);
    git(&repo, &["config", "user.name", "test"]);
    std::fs::write(repo.join("README.md"), "readme").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "init"]);

    let path_env = format!(
        "{}:{}",
        bin.display(),
        std::env::var("PATH").unwrap_or_default()
    );
    TestProject {
        _temp: temp,
        repo,
        path_env,
    }
}

#[test]
fn test_help() {
    ralphex()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Autonomous plan execution"));
}

#[test]
fn test_version() {
    ralphex()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_claude_is_fatal_precondition() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    // PATH has git (fake) but no claude
    write_script(&bin, "git", "#!/bin/sh\nexit 0\n");

    ralphex()
        .current_dir(temp.path())
        .env("PATH", bin.to_str().unwrap())
        .assert()
        .failure()
        .code(6)
        .stderr(predicate::str::contains("claude not found in PATH"));
}

#[test]
fn test_full_run_with_plan_succeeds() {
    let project = project_with_agents(AGENT_SCRIPT);
    std::fs::write(project.repo.join("plan.md"), "# do the thing").unwrap();

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("plan.md")
        .assert()
        .success()
        .stdout(predicate::str::contains("success"));

    let log = std::fs::read_to_string(project.repo.join("progress-plan.txt")).unwrap();
    assert!(log.starts_with("Plan: plan.md"));
    assert!(log.contains("Mode: full"));
    assert!(log.contains("task iteration 1: COMPLETED"));
    assert!(log.contains("review-1 iteration 1: REVIEW_DONE"));
    assert!(log.contains("codex iteration 1: COMPLETED"));
    assert!(log.contains("review-2 iteration 1: REVIEW_DONE"));
    assert!(log.lines().last().unwrap().starts_with("Completed: "));
}

#[test]
fn test_full_run_creates_feature_branch() {
    let project = project_with_agents(AGENT_SCRIPT);
    std::fs::write(project.repo.join("2024-06-01-add-cache.md"), "# plan").unwrap();

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("2024-06-01-add-cache.md")
        .assert()
        .success();

    let output = StdCommand::new("git")
        .args(["branch", "--show-current"])
        .current_dir(&project.repo)
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "add-cache");
}

#[test]
fn test_review_mode_runs_without_plan() {
    let project = project_with_agents(AGENT_SCRIPT);

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("--review")
        .assert()
        .success();

    let log = std::fs::read_to_string(project.repo.join("progress-review.txt")).unwrap();
    assert!(log.starts_with("Plan: (no plan - review only)"));
    assert!(log.contains("Mode: review"));
    assert!(!log.contains(" task iteration"));
}

#[test]
fn test_codex_only_skips_task_and_first_review() {
    let project = project_with_agents(AGENT_SCRIPT);

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("--codex-only")
        .assert()
        .success();

    let log = std::fs::read_to_string(project.repo.join("progress-codex.txt")).unwrap();
    assert!(log.contains("Mode: codex-only"));
    assert!(!log.contains(" task iteration"));
    assert!(!log.contains("review-1"));
    assert!(log.contains("codex iteration 1: COMPLETED"));
    assert!(log.contains("review-2 iteration 1: REVIEW_DONE"));
}

#[test]
fn test_missing_plan_file_is_fatal() {
    let project = project_with_agents(AGENT_SCRIPT);

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("no-such-plan.md")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("plan file not found"));
}

#[test]
fn test_exhausted_run_reports_incomplete() {
    let project = project_with_agents(SILENT_AGENT_SCRIPT);
    std::fs::write(project.repo.join("plan.md"), "# plan").unwrap();
    // keep budgets tiny so the silent agent exhausts quickly
    std::fs::write(
        project.repo.join(".ralphex.toml"),
        r#"
[task]
max_iterations = 2
transient_retries = 0
delay_ms = 0

[first_review]
delay_ms = 0
transient_retries = 0

[codex]
max_iterations = 1
delay_ms = 0
transient_retries = 0

[second_review]
delay_ms = 0
transient_retries = 0
"#,
    )
    .unwrap();

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("plan.md")
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("incomplete"));

    let log = std::fs::read_to_string(project.repo.join("progress-plan.txt")).unwrap();
    // task loop used its full budget, later phases still ran
    assert!(log.contains("task iteration 2: UNRESOLVED"));
    assert!(!log.contains("task iteration 3"));
    assert!(log.contains("review-2 iteration 1: UNRESOLVED"));
    assert!(log.lines().last().unwrap().starts_with("Completed: "));
}

#[test]
fn test_json_report_output() {
    let project = project_with_agents(AGENT_SCRIPT);
    std::fs::write(project.repo.join("plan.md"), "# plan").unwrap();

    let output = ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .args(["--json", "plan.md"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_line = stdout
        .lines()
        .find(|l| l.starts_with('{'))
        .expect("json report line");
    let report: serde_json::Value = serde_json::from_str(json_line).unwrap();
    assert_eq!(report["status"], "success");
    assert!(report["progress_log"]
        .as_str()
        .unwrap()
        .ends_with("progress-plan.txt"));
}

#[test]
fn test_gitignore_gains_progress_pattern() {
    let project = project_with_agents(AGENT_SCRIPT);

    ralphex()
        .current_dir(&project.repo)
        .env("PATH", &project.path_env)
        .arg("--review")
        .assert()
        .success();

    let gitignore = std::fs::read_to_string(project.repo.join(".gitignore")).unwrap();
    assert!(gitignore.contains("progress-*.txt"));
}
