//! Pipeline phases and run modes.
//!
//! A run advances through an ordered, fixed sequence of phases. The mode,
//! selected once at startup and immutable for the run's lifetime, decides
//! which phases execute. A completed phase is never re-entered.

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Run-wide selection of which phases execute.
///
/// # Example
///
/// ```
/// use ralphex::phase::{Mode, Phase};
///
/// assert_eq!(Mode::CodexOnly.phases(), &[Phase::CodexLoop, Phase::SecondReview]);
/// assert!(!Mode::Review.requires_plan());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Task execution plus the full review pipeline.
    Full,
    /// Skip task execution, run the full review pipeline.
    Review,
    /// Skip tasks and first review, run only the codex loop and final review.
    CodexOnly,
}

impl Mode {
    /// Resolve the mode from the CLI flags.
    #[must_use]
    pub fn from_flags(review: bool, codex_only: bool) -> Self {
        if codex_only {
            Self::CodexOnly
        } else if review {
            Self::Review
        } else {
            Self::Full
        }
    }

    /// The ordered phase sequence for this mode.
    #[must_use]
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Self::Full => &[
                Phase::TaskLoop,
                Phase::FirstReview,
                Phase::CodexLoop,
                Phase::SecondReview,
            ],
            Self::Review => &[Phase::FirstReview, Phase::CodexLoop, Phase::SecondReview],
            Self::CodexOnly => &[Phase::CodexLoop, Phase::SecondReview],
        }
    }

    /// Whether a plan file is mandatory in this mode. Review-only modes
    /// operate on existing changes and need no plan.
    #[must_use]
    pub fn requires_plan(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Review => write!(f, "review"),
            Self::CodexOnly => write!(f, "codex-only"),
        }
    }
}

/// One stage of the fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Execute plan tasks until the agent reports COMPLETED.
    TaskLoop,
    /// First review pass over the changes.
    FirstReview,
    /// External (codex) review loop.
    CodexLoop,
    /// Final review pass.
    SecondReview,
}

impl Phase {
    /// Short name used in log entries and error context.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskLoop => "task",
            Self::FirstReview => "review-1",
            Self::CodexLoop => "codex",
            Self::SecondReview => "review-2",
        }
    }

    /// The signal that concludes this phase successfully.
    ///
    /// Task and codex loops finish on `COMPLETED`; review passes finish on
    /// `REVIEW_DONE`.
    #[must_use]
    pub fn expected_signal(&self) -> Signal {
        match self {
            Self::TaskLoop | Self::CodexLoop => Signal::Completed,
            Self::FirstReview | Self::SecondReview => Signal::ReviewDone,
        }
    }

    /// Whether this phase is a single-shot review pass by default. Review
    /// passes still run through the iteration controller so their
    /// cardinality stays configurable.
    #[must_use]
    pub fn is_review(&self) -> bool {
        matches!(self, Self::FirstReview | Self::SecondReview)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
