//! Testing infrastructure: scripted agent invokers.
//!
//! Unit tests for the iteration controller and runner need deterministic
//! agent behavior. [`ScriptedInvoker`] implements
//! [`AgentInvoker`](crate::executor::AgentInvoker) with a fixed sequence of
//! outcomes, so retry and phase-transition logic can be exercised without
//! spawning processes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RalphexError, Result};
use crate::executor::{AgentInvoker, Invocation, OutputSink};
use crate::signal::Signal;

/// One scripted invocation outcome, with optional output lines that are
/// streamed to the sink before the outcome is returned.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    /// Lines streamed to the sink, in order.
    pub lines: Vec<String>,
    /// The invocation result.
    pub invocation: Invocation,
}

impl ScriptedStep {
    /// A step that emits no output and resolves to `signal`.
    #[must_use]
    pub fn signal(signal: Signal) -> Self {
        Self {
            lines: Vec::new(),
            invocation: Invocation {
                signal,
                exit_code: Some(0),
                duration: Duration::from_millis(1),
                cancelled: false,
            },
        }
    }

    /// A step that reports cancellation mid-invocation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            lines: Vec::new(),
            invocation: Invocation {
                signal: Signal::Unresolved,
                exit_code: None,
                duration: Duration::from_millis(1),
                cancelled: true,
            },
        }
    }

    /// Attach output lines streamed before the outcome.
    #[must_use]
    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|l| (*l).to_string()).collect();
        self
    }
}

/// [`AgentInvoker`] that replays a fixed script of outcomes.
///
/// Invoking past the end of the script is a test bug and returns an error
/// so the failure is visible in the calling test.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    steps: Mutex<VecDeque<ScriptedStep>>,
    calls: AtomicU32,
}

impl ScriptedInvoker {
    /// Build an invoker from explicit steps.
    #[must_use]
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Build an invoker where each invocation resolves to the next signal.
    #[must_use]
    pub fn from_signals(signals: &[Signal]) -> Self {
        Self::new(signals.iter().map(|s| ScriptedStep::signal(*s)).collect())
    }

    /// Number of invocations made so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, _prompt: &str, sink: &mut dyn OutputSink) -> Result<Invocation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .ok_or_else(|| {
                RalphexError::Other(anyhow::anyhow!("scripted invoker exhausted its script"))
            })?;

        for line in &step.lines {
            sink.line(line);
        }
        Ok(step.invocation)
    }
}

/// [`AgentInvoker`] that always fails to start, simulating a missing
/// command or an executor that must never be reached.
#[derive(Debug)]
pub struct UnreachableInvoker {
    tool: String,
}

impl UnreachableInvoker {
    /// Create an invoker that errors with `MissingTool` for `tool`.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl AgentInvoker for UnreachableInvoker {
    async fn invoke(&self, _prompt: &str, _sink: &mut dyn OutputSink) -> Result<Invocation> {
        Err(RalphexError::MissingTool {
            tool: self.tool.clone(),
        })
    }
}
