//! Plan file selection.
//!
//! An explicit path must exist. Review-only modes make the plan optional.
//! Otherwise plans are discovered under `docs/plans`: a single plan is
//! auto-selected, multiple plans go through interactive `fzf` selection.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{RalphexError, Result};

/// Directory searched for plan files.
pub const PLANS_DIR: &str = "docs/plans";

/// Resolve the plan file for this run.
///
/// Returns `None` only when no plan was supplied and `optional` is true.
pub fn select_plan(explicit: Option<PathBuf>, optional: bool, dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(RalphexError::PlanNotFound { path });
        }
        return Ok(Some(path));
    }

    if optional {
        return Ok(None);
    }

    select_from_plans_dir(dir).map(Some)
}

/// List plan files (`*.md`) in the plans directory, sorted by name.
fn list_plans(dir: &Path) -> Result<Vec<PathBuf>> {
    let plans_dir = dir.join(PLANS_DIR);
    if !plans_dir.is_dir() {
        return Err(RalphexError::config(format!(
            "plans directory not found: {}",
            plans_dir.display()
        )));
    }

    let mut plans: Vec<PathBuf> = std::fs::read_dir(&plans_dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    plans.sort();
    Ok(plans)
}

fn select_from_plans_dir(dir: &Path) -> Result<PathBuf> {
    let plans = list_plans(dir)?;
    if plans.is_empty() {
        return Err(RalphexError::config(format!(
            "no plans found in {PLANS_DIR}"
        )));
    }

    if plans.len() == 1 {
        info!(plan = %plans[0].display(), "auto-selected single plan");
        return Ok(plans[0].clone());
    }

    select_with_fzf(&plans)
}

fn select_with_fzf(plans: &[PathBuf]) -> Result<PathBuf> {
    if which::which("fzf").is_err() {
        return Err(RalphexError::config(
            "fzf not found, please provide plan file as argument",
        ));
    }

    let mut child = Command::new("fzf")
        .args([
            "--prompt=select plan: ",
            "--preview=head -50 {}",
            "--preview-window=right:60%",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        let listing = plans
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        stdin.write_all(listing.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(RalphexError::config("no plan selected"));
    }

    let selected = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if selected.is_empty() {
        return Err(RalphexError::config("no plan selected"));
    }
    Ok(PathBuf::from(selected))
}
