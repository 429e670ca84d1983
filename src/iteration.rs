//! Bounded retry loop around one phase's unit of work.
//!
//! The controller invokes the executor, classifies the result against the
//! phase's expected terminal signal, and decides to finish, retry, or give
//! up. A small retry budget absorbs transient `FAILED` signals within a
//! single iteration before the iteration budget is charged. Exhaustion is
//! an "incomplete" outcome, not an error: later phases still run.
//!
//! Iteration counters are owned here and live for exactly one phase; there
//! is no process-wide counter state.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PhaseConfig;
use crate::error::{RalphexError, Result};
use crate::executor::{AgentInvoker, OutputSink};
use crate::phase::Phase;
use crate::progress::{ProgressEntry, ProgressRecorder};
use crate::signal::Signal;

/// Per-phase attempt counters. Reset when a new phase begins.
#[derive(Debug, Clone)]
pub struct IterationState {
    attempts: u32,
    max_iterations: u32,
    transient_budget: u32,
    transient_left: u32,
}

impl IterationState {
    /// Fresh state for a phase with the given budgets.
    #[must_use]
    pub fn new(max_iterations: u32, transient_retries: u32) -> Self {
        Self {
            attempts: 0,
            max_iterations,
            transient_budget: transient_retries,
            transient_left: transient_retries,
        }
    }

    /// Iterations consumed so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 1-indexed number of the iteration currently in flight.
    #[must_use]
    pub fn current_iteration(&self) -> u32 {
        self.attempts + 1
    }

    /// Try to absorb a transient FAILED without charging the iteration
    /// budget. Returns false once the per-iteration budget is spent.
    pub fn try_transient_retry(&mut self) -> bool {
        if self.transient_left == 0 {
            return false;
        }
        self.transient_left -= 1;
        true
    }

    /// Charge one iteration and refresh the transient budget for the next.
    pub fn consume_iteration(&mut self) {
        self.attempts += 1;
        self.transient_left = self.transient_budget;
    }

    /// Whether the iteration budget is spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_iterations
    }
}

/// Terminal outcome of driving one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// The expected terminal signal arrived.
    Completed {
        /// Iterations consumed, including the successful one.
        iterations: u32,
    },
    /// The iteration budget ran out without the expected signal.
    Exhausted {
        /// Iterations consumed.
        iterations: u32,
    },
    /// The run was cancelled before or during an invocation.
    Cancelled,
}

impl PhaseOutcome {
    /// Whether the phase reached its expected signal.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Drives a phase's unit of work to completion or exhaustion.
#[derive(Debug)]
pub struct IterationController<'a> {
    phase: Phase,
    config: &'a PhaseConfig,
    cancel: CancellationToken,
}

impl<'a> IterationController<'a> {
    /// Create a controller for one phase.
    #[must_use]
    pub fn new(phase: Phase, config: &'a PhaseConfig, cancel: CancellationToken) -> Self {
        Self {
            phase,
            config,
            cancel,
        }
    }

    /// Run the retry loop.
    ///
    /// One [`ProgressEntry`] is appended per attempt. Fatal executor faults
    /// propagate as errors annotated with the phase and iteration; every
    /// other outcome is returned as a [`PhaseOutcome`].
    pub async fn run(
        &self,
        invoker: &dyn AgentInvoker,
        prompt: &str,
        sink: &mut dyn OutputSink,
        recorder: &mut ProgressRecorder,
    ) -> Result<PhaseOutcome> {
        let expected = self.phase.expected_signal();
        let mut state =
            IterationState::new(self.config.max_iterations, self.config.transient_retries);

        loop {
            if self.cancel.is_cancelled() {
                info!(phase = %self.phase, "cancelled before invocation");
                return Ok(PhaseOutcome::Cancelled);
            }

            let iteration = state.current_iteration();
            debug!(phase = %self.phase, iteration, "invoking agent");

            let invocation = invoker
                .invoke(prompt, sink)
                .await
                .map_err(|e| self.annotate(e, iteration))?;

            let mut entry = ProgressEntry::new(self.phase, iteration, invocation.signal);
            let mut notes = Vec::new();
            if let Some(code) = invocation.exit_code {
                notes.push(format!("exit {code}"));
            }
            if invocation.cancelled {
                notes.push("cancelled".to_string());
            }
            if !notes.is_empty() {
                entry = entry.with_note(notes.join(", "));
            }
            recorder.record(&entry)?;

            if invocation.cancelled {
                info!(phase = %self.phase, iteration, "invocation cancelled");
                return Ok(PhaseOutcome::Cancelled);
            }

            if invocation.signal == expected {
                state.consume_iteration();
                info!(
                    phase = %self.phase,
                    iterations = state.attempts(),
                    "phase completed"
                );
                return Ok(PhaseOutcome::Completed {
                    iterations: state.attempts(),
                });
            }

            // Exit code 0 without a marker is still Unresolved; implicit
            // success is never inferred from exit status.
            if invocation.signal == Signal::Failed && state.try_transient_retry() {
                warn!(
                    phase = %self.phase,
                    iteration,
                    "transient FAILED, retrying within iteration"
                );
            } else {
                state.consume_iteration();
                if state.is_exhausted() {
                    warn!(
                        phase = %self.phase,
                        iterations = state.attempts(),
                        "iteration budget exhausted"
                    );
                    return Ok(PhaseOutcome::Exhausted {
                        iterations: state.attempts(),
                    });
                }
            }

            // Inter-iteration delay; observes cancellation promptly.
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!(phase = %self.phase, "cancelled during retry delay");
                    return Ok(PhaseOutcome::Cancelled);
                }
                () = tokio::time::sleep(self.config.delay()) => {}
            }
        }
    }

    fn annotate(&self, err: RalphexError, iteration: u32) -> RalphexError {
        match err {
            // already self-describing, keep the precise variant
            e @ (RalphexError::MissingTool { .. } | RalphexError::ProgressLog { .. }) => e,
            e => RalphexError::executor(self.phase.name(), iteration, e.to_string()),
        }
    }
}
