//! Terminal signal detection over streamed agent output.
//!
//! The agent's only observable contract is a stream of text. A terminal
//! marker is a fixed-vocabulary line (`COMPLETED`, `FAILED`, `REVIEW_DONE`)
//! that must be the entire trimmed line content; matching is case-sensitive
//! and first-match-wins. Whole-line matching prevents false positives from
//! the agent merely discussing the word "completed" in prose.
//!
//! Classification is a pure function over lines; the scanner adds the
//! incremental, first-match-wins bookkeeping on top. I/O lives in the
//! executor, which keeps this module trivially testable.

use serde::{Deserialize, Serialize};

/// Terminal marker extracted from one subprocess invocation.
///
/// `Unresolved` means the process exited without emitting a recognized
/// marker; callers treat it as an implicit failure for retry purposes.
/// Exit code 0 is never implicit success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Agent reported the unit of work as done.
    Completed,
    /// Agent reported a failure for this attempt.
    Failed,
    /// Agent reported a review pass as done.
    ReviewDone,
    /// Process exited without any recognized marker.
    Unresolved,
}

impl Signal {
    /// The marker line for this signal, if it has one.
    #[must_use]
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Completed => Some("COMPLETED"),
            Self::Failed => Some("FAILED"),
            Self::ReviewDone => Some("REVIEW_DONE"),
            Self::Unresolved => None,
        }
    }

    /// Check if this signal terminates the invocation early (the child is
    /// killed once it is seen).
    #[must_use]
    pub fn is_terminal_marker(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.marker() {
            Some(m) => write!(f, "{m}"),
            None => write!(f, "UNRESOLVED"),
        }
    }
}

/// Classify a single output line.
///
/// Returns `Some` only when the trimmed line is exactly one of the marker
/// words. Case-sensitive.
///
/// # Example
///
/// ```
/// use ralphex::signal::{classify_line, Signal};
///
/// assert_eq!(classify_line("COMPLETED"), Some(Signal::Completed));
/// assert_eq!(classify_line("  REVIEW_DONE  "), Some(Signal::ReviewDone));
/// assert_eq!(classify_line("the task completed fine"), None);
/// ```
#[must_use]
pub fn classify_line(line: &str) -> Option<Signal> {
    match line.trim() {
        "COMPLETED" => Some(Signal::Completed),
        "FAILED" => Some(Signal::Failed),
        "REVIEW_DONE" => Some(Signal::ReviewDone),
        _ => None,
    }
}

/// Incremental classifier applied to a growing output stream.
///
/// Once a marker is found, later output is ignored for classification
/// (though the executor keeps streaming it for display).
#[derive(Debug, Default)]
pub struct SignalScanner {
    found: Option<Signal>,
}

impl SignalScanner {
    /// Create a scanner with no signal observed yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns the terminal signal the first time one is
    /// recognized, `None` otherwise (still running, or already resolved).
    pub fn observe_line(&mut self, line: &str) -> Option<Signal> {
        if self.found.is_some() {
            return None;
        }
        if let Some(signal) = classify_line(line) {
            self.found = Some(signal);
            return Some(signal);
        }
        None
    }

    /// The signal observed so far, if any.
    #[must_use]
    pub fn signal(&self) -> Option<Signal> {
        self.found
    }

    /// Conclude scanning at process exit: the observed marker, or
    /// `Unresolved` when none appeared.
    #[must_use]
    pub fn conclude(self) -> Signal {
        self.found.unwrap_or(Signal::Unresolved)
    }
}
