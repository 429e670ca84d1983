//! ralphex - autonomous plan execution with Claude Code.
//!
//! Drives an external coding agent through an ordered pipeline of phases
//! (task loop, first review, codex loop, second review), classifying the
//! agent's streamed output against a fixed vocabulary of whole-line
//! markers and retrying with bounded budgets. Every attempt is mirrored to
//! an append-only progress log that survives the process for postmortem
//! inspection.
//!
//! # Architecture
//!
//! ```text
//! Runner (mode, cancellation, progress log)
//!   └── per phase: IterationController (attempt/retry budgets)
//!         └── Executor (one subprocess at a time)
//!               └── SignalScanner (COMPLETED / FAILED / REVIEW_DONE)
//! ```
//!
//! The orchestrator is single-threaded and cooperative: exactly one agent
//! subprocess is active at any time, and components communicate by return
//! value rather than shared mutable state.

pub mod config;
pub mod error;
pub mod executor;
pub mod git;
pub mod iteration;
pub mod phase;
pub mod plan;
pub mod progress;
pub mod prompt;
pub mod runner;
pub mod signal;
pub mod testing;

// Re-export commonly used types
pub use config::{PhaseConfig, RunnerConfig};
pub use error::{RalphexError, Result};
pub use executor::{AgentInvoker, Executor, ExecutorBinding, Invocation, OutputSink};
pub use iteration::{IterationController, IterationState, PhaseOutcome};
pub use phase::{Mode, Phase};
pub use progress::{format_elapsed, ProgressEntry, ProgressRecorder};
pub use runner::{RunContext, RunReport, RunStatus, Runner};
pub use signal::{classify_line, Signal, SignalScanner};
