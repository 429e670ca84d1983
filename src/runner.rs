//! Top-level run coordination.
//!
//! The runner resolves the phase sequence from the mode, opens the progress
//! recorder, and drives each phase's iteration controller in order. Phase
//! transitions are unconditional once a controller returns: exhaustion is
//! logged and the pipeline continues, because review phases still have
//! value when prior work was incomplete. Only fatal executor faults abort
//! the run.
//!
//! The runner is the sole owner of the cancellation token; the recorder's
//! file handle is released on every exit path (the fatal path relies on
//! drop).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::error::Result;
use crate::executor::{AgentInvoker, Executor, ExecutorBinding, StdoutSink};
use crate::iteration::{IterationController, PhaseOutcome};
use crate::phase::{Mode, Phase};
use crate::progress::{progress_filename, ProgressRecorder};
use crate::prompt::PhasePrompts;

/// Immutable per-run context, created once before any phase starts.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Cancellation token observed by every suspension point.
    pub cancel: CancellationToken,
    /// Selected run mode.
    pub mode: Mode,
    /// Absolute plan file path, when one was selected.
    pub plan_file: Option<PathBuf>,
    /// Branch the run executes on, for the log header.
    pub branch: String,
    /// Run start time.
    pub started: Instant,
}

impl RunContext {
    /// Create a context with a fresh cancellation token.
    #[must_use]
    pub fn new(mode: Mode, plan_file: Option<PathBuf>, branch: String) -> Self {
        Self {
            cancel: CancellationToken::new(),
            mode,
            plan_file,
            branch,
            started: Instant::now(),
        }
    }

    fn plan_display(&self) -> String {
        match &self.plan_file {
            Some(path) => path.display().to_string(),
            None => "(no plan - review only)".to_string(),
        }
    }
}

/// Terminal status of one complete run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every executed phase reached its expected signal.
    Success,
    /// At least one phase exhausted its iteration budget.
    Incomplete,
    /// The run was interrupted by cancellation.
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result value reported to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Worst phase outcome observed.
    pub status: RunStatus,
    /// Total wall-clock time.
    pub elapsed: Duration,
    /// Path to the progress log for this run.
    pub progress_log: PathBuf,
}

/// Drives one complete run through the phase state machine.
pub struct Runner {
    config: RunnerConfig,
    ctx: RunContext,
    prompts: PhasePrompts,
    project_dir: PathBuf,
}

impl Runner {
    /// Create a runner over a project directory.
    #[must_use]
    pub fn new(config: RunnerConfig, ctx: RunContext, project_dir: PathBuf) -> Self {
        let prompts = PhasePrompts::render(ctx.plan_file.as_deref());
        Self {
            config,
            ctx,
            prompts,
            project_dir,
        }
    }

    /// The run's cancellation token, for wiring to signal handlers.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// Run all phases with the real subprocess executor.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_with(|phase| {
            let binding = ExecutorBinding::from(self.config.phase(phase));
            Box::new(Executor::new(binding, self.ctx.cancel.clone()))
        })
        .await
    }

    /// Run all phases, constructing one invoker per phase via
    /// `make_invoker`. This is the seam scripted tests use.
    pub async fn run_with<F>(&self, make_invoker: F) -> Result<RunReport>
    where
        F: Fn(Phase) -> Box<dyn AgentInvoker>,
    {
        let log_path = self
            .project_dir
            .join(progress_filename(self.ctx.plan_file.as_deref(), self.ctx.mode));
        let mut recorder = ProgressRecorder::create(
            log_path.clone(),
            &self.ctx.plan_display(),
            &self.ctx.branch,
            self.ctx.mode,
        )?;

        info!(
            mode = %self.ctx.mode,
            plan = %self.ctx.plan_display(),
            branch = %self.ctx.branch,
            log = %log_path.display(),
            "starting run"
        );

        let mut incomplete = false;

        for &phase in self.ctx.mode.phases() {
            let phase_config = self.config.phase(phase);
            let invoker = make_invoker(phase);
            let controller =
                IterationController::new(phase, phase_config, self.ctx.cancel.clone());
            let mut sink = StdoutSink;

            let outcome = controller
                .run(
                    invoker.as_ref(),
                    self.prompts.for_phase(phase),
                    &mut sink,
                    &mut recorder,
                )
                .await?;

            match outcome {
                PhaseOutcome::Completed { iterations } => {
                    info!(%phase, iterations, "phase succeeded");
                }
                PhaseOutcome::Exhausted { iterations } => {
                    warn!(%phase, iterations, "phase incomplete, continuing");
                    incomplete = true;
                }
                PhaseOutcome::Cancelled => {
                    let elapsed = self.ctx.started.elapsed();
                    recorder.finish_cancelled(elapsed)?;
                    info!("run cancelled");
                    return Ok(RunReport {
                        status: RunStatus::Cancelled,
                        elapsed,
                        progress_log: log_path,
                    });
                }
            }
        }

        let elapsed = self.ctx.started.elapsed();
        recorder.finish(elapsed)?;

        let status = if incomplete {
            RunStatus::Incomplete
        } else {
            RunStatus::Success
        };
        info!(%status, "run finished");

        Ok(RunReport {
            status,
            elapsed,
            progress_log: log_path,
        })
    }
}
