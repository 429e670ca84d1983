//! Git collaborators: branch setup and gitignore upkeep.
//!
//! Branch creation is a precondition of the run, not part of the phase
//! state machine: when the repository is on main/master, a feature branch
//! named after the plan file is created before any phase starts.

use std::path::Path;
use std::process::Command;

use regex::Regex;
use tracing::info;

use crate::error::{RalphexError, Result};

/// The current branch name (`git branch --show-current`).
pub fn current_branch(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["branch", "--show-current"])
        .current_dir(dir)
        .output()
        .map_err(|e| RalphexError::git("branch", e.to_string()))?;

    if !output.status.success() {
        return Err(RalphexError::git(
            "branch",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Derive a branch name from a plan filename: the stem with any leading
/// date prefix (like `2024-01-15-`) removed.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use ralphex::git::branch_name_from_plan;
///
/// let plan = Path::new("docs/plans/2024-01-15-add-cache.md");
/// assert_eq!(branch_name_from_plan(plan), "add-cache");
/// ```
#[must_use]
pub fn branch_name_from_plan(plan_file: &Path) -> String {
    let stem = plan_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let Ok(date_prefix) = Regex::new(r"^[\d-]+") else {
        return stem;
    };
    let name = date_prefix.replace(&stem, "");
    let name = name.trim_start_matches('-');
    if name.is_empty() {
        stem
    } else {
        name.to_string()
    }
}

/// Create a feature branch named after the plan when currently on
/// main/master. Already being on a feature branch is a no-op.
pub fn create_branch_if_needed(dir: &Path, plan_file: &Path) -> Result<()> {
    let current = current_branch(dir)?;
    if current != "main" && current != "master" {
        return Ok(());
    }

    let branch = branch_name_from_plan(plan_file);
    info!(%branch, "creating branch");

    let status = Command::new("git")
        .args(["checkout", "-b", &branch])
        .current_dir(dir)
        .status()
        .map_err(|e| RalphexError::git("checkout", e.to_string()))?;

    if !status.success() {
        return Err(RalphexError::git(
            "checkout",
            format!("failed to create branch {branch}"),
        ));
    }
    Ok(())
}

/// Ensure `progress-*.txt` logs are gitignored, appending to `.gitignore`
/// when they are not.
pub fn ensure_gitignore(dir: &Path) -> Result<()> {
    let already_ignored = Command::new("git")
        .args(["check-ignore", "-q", "progress-test.txt"])
        .current_dir(dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if already_ignored {
        return Ok(());
    }

    let gitignore = dir.join(".gitignore");
    let mut contents = std::fs::read_to_string(&gitignore).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str("\n# ralphex progress logs\nprogress-*.txt\n");
    std::fs::write(&gitignore, contents)
        .map_err(|e| RalphexError::git("gitignore", e.to_string()))?;

    info!("added progress-*.txt to .gitignore");
    Ok(())
}
