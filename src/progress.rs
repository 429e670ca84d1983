//! Append-only progress log for a single run.
//!
//! The log is a plain-text file that tooling can parse: four header lines
//! (`Plan:`, `Branch:`, `Mode:`, `Started:`), a separator rule, one line
//! per event, a closing separator, and a final `Completed:` (or
//! `Cancelled:`) line with the elapsed time. Entries are never rewritten.
//! Observability is part of correctness here: if the log cannot be opened
//! or written, the run is fatal.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;

use crate::error::{RalphexError, Result};
use crate::phase::{Mode, Phase};
use crate::signal::Signal;

const SEPARATOR_WIDTH: usize = 60;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One immutable, timestamped log record for a single invocation attempt.
#[derive(Debug, Clone)]
pub struct ProgressEntry {
    /// Phase the attempt belongs to.
    pub phase: Phase,
    /// 1-indexed iteration within the phase.
    pub iteration: u32,
    /// Terminal classification of the attempt.
    pub signal: Signal,
    /// Free-text annotation (exit status, retry context).
    pub note: String,
}

impl ProgressEntry {
    /// Create an entry with an empty annotation.
    #[must_use]
    pub fn new(phase: Phase, iteration: u32, signal: Signal) -> Self {
        Self {
            phase,
            iteration,
            signal,
            note: String::new(),
        }
    }

    /// Attach an annotation.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// Derive the progress log filename from the plan file and mode.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use ralphex::phase::Mode;
/// use ralphex::progress::progress_filename;
///
/// let plan = Path::new("docs/plans/2024-01-15-add-cache.md");
/// assert_eq!(progress_filename(Some(plan), Mode::Full), "progress-2024-01-15-add-cache.txt");
/// assert_eq!(progress_filename(None, Mode::CodexOnly), "progress-codex.txt");
/// ```
#[must_use]
pub fn progress_filename(plan_file: Option<&Path>, mode: Mode) -> String {
    let suffix = match mode {
        Mode::Full => "",
        Mode::Review => "-review",
        Mode::CodexOnly => "-codex",
    };

    match plan_file.and_then(|p| p.file_stem()).map(|s| s.to_string_lossy()) {
        Some(stem) => format!("progress-{stem}{suffix}.txt"),
        None => format!("progress{suffix}.txt"),
    }
}

/// Format elapsed wall-clock time as `<N>s`, `<N>m<N>s`, or `<N>h<N>m<N>s`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    if total < 60 {
        return format!("{total}s");
    }
    let minutes = total / 60;
    let seconds = total % 60;
    if minutes < 60 {
        return format!("{minutes}m{seconds}s");
    }
    let hours = minutes / 60;
    let minutes = minutes % 60;
    format!("{hours}h{minutes}m{seconds}s")
}

/// Owner of the append-only log file for the run's entire lifetime.
///
/// Only the recorder writes to the file; every other component reports
/// results by return value, so no locking is needed.
#[derive(Debug)]
pub struct ProgressRecorder {
    file: File,
    path: PathBuf,
}

impl ProgressRecorder {
    /// Create the log file and write the run header.
    ///
    /// `plan_display` is the plan path, or a placeholder like
    /// `(no plan - review only)` for plan-less modes.
    pub fn create(path: PathBuf, plan_display: &str, branch: &str, mode: Mode) -> Result<Self> {
        let file = File::create(&path).map_err(|e| {
            RalphexError::progress_log(format!("failed to create {}: {e}", path.display()))
        })?;

        let mut recorder = Self { file, path };
        recorder.write_line(&format!("Plan: {plan_display}"))?;
        recorder.write_line(&format!("Branch: {branch}"))?;
        recorder.write_line(&format!("Mode: {mode}"))?;
        recorder.write_line(&format!(
            "Started: {}",
            Local::now().format(TIMESTAMP_FORMAT)
        ))?;
        recorder.write_line(&"-".repeat(SEPARATOR_WIDTH))?;
        Ok(recorder)
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event line. Entries are strictly ordered by wall-clock
    /// time and mirror phase execution order.
    pub fn record(&mut self, entry: &ProgressEntry) -> Result<()> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let mut line = format!(
            "[{timestamp}] {} iteration {}: {}",
            entry.phase, entry.iteration, entry.signal
        );
        if !entry.note.is_empty() {
            line.push_str(" - ");
            line.push_str(&entry.note);
        }
        self.write_line(&line)
    }

    /// Write the closing separator and `Completed:` footer.
    pub fn finish(&mut self, elapsed: Duration) -> Result<()> {
        self.footer("Completed", elapsed)
    }

    /// Write the closing separator and `Cancelled:` footer.
    pub fn finish_cancelled(&mut self, elapsed: Duration) -> Result<()> {
        self.footer("Cancelled", elapsed)
    }

    fn footer(&mut self, label: &str, elapsed: Duration) -> Result<()> {
        self.write_line(&"-".repeat(SEPARATOR_WIDTH))?;
        self.write_line(&format!(
            "{label}: {} ({})",
            Local::now().format(TIMESTAMP_FORMAT),
            format_elapsed(elapsed)
        ))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{line}")
            .and_then(|()| self.file.flush())
            .map_err(|e| {
                RalphexError::progress_log(format!("failed to write {}: {e}", self.path.display()))
            })
    }
}
