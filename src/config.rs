//! Configuration loading for ralphex.
//!
//! Each phase carries its own executor binding (command + arguments),
//! iteration cap, transient retry budget, and inter-iteration delay.
//! Defaults work out of the box; a `.ralphex.toml` in the project directory
//! overrides them. The specific numeric defaults are configurable, not
//! load-bearing.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RalphexError, Result};
use crate::phase::Phase;

/// Config filename looked up in the project directory.
pub const CONFIG_FILENAME: &str = ".ralphex.toml";

/// Default inter-iteration delay in milliseconds. Avoids hammering a
/// struggling agent and lets external state such as file locks settle.
pub const DEFAULT_DELAY_MS: u64 = 2000;

/// Default retry budget for transient FAILED signals within one iteration.
pub const DEFAULT_TRANSIENT_RETRIES: u32 = 2;

/// Default iteration cap for the task loop.
pub const DEFAULT_TASK_ITERATIONS: u32 = 50;

/// Default iteration cap for the codex loop.
pub const DEFAULT_CODEX_ITERATIONS: u32 = 20;

/// Per-phase executor binding and retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Command name of the external agent.
    pub command: String,
    /// Argument list passed to the command.
    pub args: Vec<String>,
    /// Maximum iterations before the phase reports exhaustion.
    pub max_iterations: u32,
    /// Retries reserved for transient FAILED signals within one iteration.
    pub transient_retries: u32,
    /// Delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: claude_args(),
            max_iterations: 1,
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl PhaseConfig {
    /// Inter-iteration delay as a [`Duration`].
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn claude_args() -> Vec<String> {
    vec!["-p".to_string(), "--dangerously-skip-permissions".to_string()]
}

/// Full runner configuration: one [`PhaseConfig`] per pipeline phase.
///
/// # Example
///
/// ```
/// use ralphex::config::RunnerConfig;
/// use ralphex::phase::Phase;
///
/// let config = RunnerConfig::default();
/// assert_eq!(config.phase(Phase::TaskLoop).max_iterations, 50);
/// assert_eq!(config.phase(Phase::FirstReview).max_iterations, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Task loop phase.
    pub task: PhaseConfig,
    /// First review pass.
    pub first_review: PhaseConfig,
    /// Codex loop phase.
    pub codex: PhaseConfig,
    /// Final review pass.
    pub second_review: PhaseConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            task: PhaseConfig {
                max_iterations: DEFAULT_TASK_ITERATIONS,
                ..PhaseConfig::default()
            },
            first_review: PhaseConfig::default(),
            codex: PhaseConfig {
                command: "codex".to_string(),
                args: vec!["exec".to_string()],
                max_iterations: DEFAULT_CODEX_ITERATIONS,
                ..PhaseConfig::default()
            },
            second_review: PhaseConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from `.ralphex.toml` in `dir`, falling back to
    /// defaults when the file is absent. A present-but-invalid file is a
    /// configuration error, not silently ignored.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            RalphexError::config_with_path(format!("failed to read config: {e}"), path.clone())
        })?;
        toml::from_str(&contents).map_err(|e| {
            RalphexError::config_with_path(format!("failed to parse config: {e}"), path)
        })
    }

    /// The configuration for one phase.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> &PhaseConfig {
        match phase {
            Phase::TaskLoop => &self.task,
            Phase::FirstReview => &self.first_review,
            Phase::CodexLoop => &self.codex,
            Phase::SecondReview => &self.second_review,
        }
    }

    /// Override the task loop iteration cap (from the CLI `-m` flag).
    pub fn set_task_iterations(&mut self, max: u32) {
        self.task.max_iterations = max;
    }
}
