//! Subprocess execution with streamed signal detection.
//!
//! The executor launches one external agent process, feeds it the prompt on
//! stdin, and streams combined stdout/stderr line-by-line through the
//! [`SignalScanner`](crate::signal::SignalScanner) and an [`OutputSink`].
//! It returns once a terminal marker is seen or the process exits on its
//! own; in both outcomes the child is terminated before returning. The
//! cancellation token is observed between line reads, so an interrupt never
//! waits behind an unbounded blocking read.
//!
//! Exactly one invocation is in flight at any time; the caller owns that
//! invariant by awaiting each invocation to completion.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RalphexError, Result};
use crate::signal::{Signal, SignalScanner};

/// Hard deadline after a cancellation kill before the drain gives up.
/// Grandchildren of the agent can keep the output pipe open past the kill,
/// so EOF alone is not a bounded wait.
const CANCEL_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Command name plus argument list binding a phase to its external agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorBinding {
    /// Command name, resolved via PATH.
    pub command: String,
    /// Argument list.
    pub args: Vec<String>,
}

impl ExecutorBinding {
    /// Create a binding from a command and its arguments.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl From<&crate::config::PhaseConfig> for ExecutorBinding {
    fn from(config: &crate::config::PhaseConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

/// Receiver for raw output lines, for display passthrough.
///
/// Raw agent output goes through this sink only; it is never written into
/// the structured progress log, which keeps the log parseable.
pub trait OutputSink: Send {
    /// Called once per streamed line, markers included.
    fn line(&mut self, line: &str);
}

/// Sink that echoes agent output to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Sink that collects lines in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    /// Collected lines in arrival order.
    pub lines: Vec<String>,
}

impl OutputSink for CollectSink {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Result of one subprocess run.
///
/// `signal` is `Unresolved` when the process exited (or was cancelled)
/// without emitting a recognized marker. `exit_code` is `None` when the
/// child was killed before exiting on its own.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Terminal classification of the streamed output.
    pub signal: Signal,
    /// Child exit code, if it exited normally.
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
    /// Whether the run was interrupted by cancellation.
    pub cancelled: bool,
}

/// Seam between the iteration controller and subprocess execution.
///
/// Production code uses [`Executor`]; tests use scripted implementations
/// from [`crate::testing`].
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run the agent once with the given prompt, streaming output through
    /// `sink`, and classify the outcome.
    async fn invoke(&self, prompt: &str, sink: &mut dyn OutputSink) -> Result<Invocation>;
}

/// Launches the bound external command and drives one invocation.
#[derive(Debug)]
pub struct Executor {
    binding: ExecutorBinding,
    cancel: CancellationToken,
}

impl Executor {
    /// Create an executor for one binding, wired to the run's cancellation
    /// token.
    #[must_use]
    pub fn new(binding: ExecutorBinding, cancel: CancellationToken) -> Self {
        Self { binding, cancel }
    }

    /// The binding this executor launches.
    #[must_use]
    pub fn binding(&self) -> &ExecutorBinding {
        &self.binding
    }
}

#[async_trait]
impl AgentInvoker for Executor {
    async fn invoke(&self, prompt: &str, sink: &mut dyn OutputSink) -> Result<Invocation> {
        let started = Instant::now();

        debug!(
            command = %self.binding.command,
            prompt_len = prompt.len(),
            "spawning agent process"
        );

        let mut child = Command::new(&self.binding.command)
            .args(&self.binding.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RalphexError::MissingTool {
                    tool: self.binding.command.clone(),
                },
                _ => RalphexError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.flush().await?;
            drop(stdin);
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stderr not captured"))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_done = false;
        let mut err_done = false;

        let mut scanner = SignalScanner::new();
        let mut cancelled = false;
        let mut drain_deadline: Option<tokio::time::Instant> = None;

        // Stream until a terminal marker appears or both pipes reach EOF.
        // A trailing partial line is delivered by next_line before EOF, so
        // it is scanned like any other line.
        'stream: while !(out_done && err_done) {
            tokio::select! {
                () = self.cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    // fixed deadline: a chatty grandchild holding the pipe
                    // open must not extend the drain
                    drain_deadline = Some(tokio::time::Instant::now() + CANCEL_DRAIN_GRACE);
                    debug!("cancellation requested, terminating agent process");
                    if let Err(e) = child.start_kill() {
                        warn!("failed to kill agent process: {e}");
                    }
                    // keep draining so partial output is flushed and scanned
                }
                () = tokio::time::sleep_until(drain_deadline.unwrap_or_else(tokio::time::Instant::now)),
                    if drain_deadline.is_some() =>
                {
                    debug!("drain grace elapsed after cancellation");
                    break 'stream;
                }
                line = out_lines.next_line(), if !out_done => {
                    match line? {
                        Some(line) => {
                            sink.line(&line);
                            if scanner.observe_line(&line).is_some() {
                                if let Err(e) = child.start_kill() {
                                    warn!("failed to kill agent process: {e}");
                                }
                                break 'stream;
                            }
                        }
                        None => out_done = true,
                    }
                }
                line = err_lines.next_line(), if !err_done => {
                    match line? {
                        Some(line) => {
                            sink.line(&line);
                            if scanner.observe_line(&line).is_some() {
                                if let Err(e) = child.start_kill() {
                                    warn!("failed to kill agent process: {e}");
                                }
                                break 'stream;
                            }
                        }
                        None => err_done = true,
                    }
                }
            }
        }

        let status = child.wait().await?;
        let signal = scanner.conclude();

        debug!(
            %signal,
            exit_code = ?status.code(),
            cancelled,
            "agent process finished"
        );

        Ok(Invocation {
            signal,
            exit_code: status.code(),
            duration: started.elapsed(),
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExecutorBinding {
        ExecutorBinding::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    async fn run(script: &str) -> (Invocation, CollectSink) {
        let executor = Executor::new(sh(script), CancellationToken::new());
        let mut sink = CollectSink::default();
        let invocation = executor.invoke("", &mut sink).await.unwrap();
        (invocation, sink)
    }

    #[tokio::test]
    async fn test_detects_completed_marker() {
        let (invocation, sink) = run("echo working; echo COMPLETED").await;
        assert_eq!(invocation.signal, Signal::Completed);
        assert!(!invocation.cancelled);
        assert!(sink.lines.contains(&"COMPLETED".to_string()));
    }

    #[tokio::test]
    async fn test_marker_word_in_prose_is_ignored() {
        let (invocation, _) =
            run("echo 'the task completed fine'; echo 'all completed here'; exit 0").await;
        assert_eq!(invocation.signal, Signal::Unresolved);
        assert_eq!(invocation.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_exit_zero_without_marker_is_unresolved() {
        let (invocation, _) = run("echo did some work; exit 0").await;
        assert_eq!(invocation.signal, Signal::Unresolved);
        assert_eq!(invocation.exit_code, Some(0));
        assert!(!invocation.cancelled);
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_marker_is_unresolved() {
        let (invocation, _) = run("echo broken; exit 3").await;
        assert_eq!(invocation.signal, Signal::Unresolved);
        assert_eq!(invocation.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_marker_on_stderr_is_detected() {
        let (invocation, sink) = run("echo REVIEW_DONE 1>&2").await;
        assert_eq!(invocation.signal, Signal::ReviewDone);
        assert!(sink.lines.contains(&"REVIEW_DONE".to_string()));
    }

    #[tokio::test]
    async fn test_partial_final_line_is_scanned() {
        // no trailing newline before EOF
        let (invocation, _) = run("printf COMPLETED").await;
        assert_eq!(invocation.signal, Signal::Completed);
    }

    #[tokio::test]
    async fn test_first_marker_wins_and_child_is_killed() {
        let (invocation, _) = run("echo FAILED; sleep 30; echo COMPLETED").await;
        assert_eq!(invocation.signal, Signal::Failed);
        assert!(invocation.duration < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_prompt_is_fed_via_stdin() {
        let executor = Executor::new(sh("cat"), CancellationToken::new());
        let mut sink = CollectSink::default();
        let invocation = executor.invoke("COMPLETED\n", &mut sink).await.unwrap();
        assert_eq!(invocation.signal, Signal::Completed);
    }

    #[tokio::test]
    async fn test_missing_command_fails_fast() {
        let binding = ExecutorBinding::new("ralphex-no-such-binary", vec![]);
        let executor = Executor::new(binding, CancellationToken::new());
        let mut sink = CollectSink::default();

        let err = executor.invoke("", &mut sink).await.unwrap_err();
        assert!(matches!(err, RalphexError::MissingTool { .. }));
        assert!(err.to_string().contains("ralphex-no-such-binary"));
    }

    #[tokio::test]
    async fn test_cancellation_terminates_child() {
        let cancel = CancellationToken::new();
        let executor = Executor::new(sh("echo partial; sleep 30"), cancel.clone());
        let mut sink = CollectSink::default();

        let trigger = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            }
        });

        let invocation = executor.invoke("", &mut sink).await.unwrap();
        trigger.await.unwrap();

        assert!(invocation.cancelled);
        assert_eq!(invocation.signal, Signal::Unresolved);
        assert!(invocation.duration < Duration::from_secs(10));
        // partial output was flushed before the kill concluded
        assert!(sink.lines.contains(&"partial".to_string()));
    }

    #[tokio::test]
    async fn test_cancellation_drain_is_bounded_with_chatty_grandchild() {
        let cancel = CancellationToken::new();
        // the backgrounded grandchild survives the kill of `sh` and keeps
        // the stdout pipe open, emitting lines faster than the drain grace
        let executor = Executor::new(
            sh("sh -c 'for i in $(seq 1 200); do echo spam; sleep 0.05; done' & wait"),
            cancel.clone(),
        );
        let mut sink = CollectSink::default();

        let trigger = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                cancel.cancel();
            }
        });

        let invocation = tokio::time::timeout(Duration::from_secs(5), executor.invoke("", &mut sink))
            .await
            .expect("invoke returned within the drain grace")
            .unwrap();
        trigger.await.unwrap();

        assert!(invocation.cancelled);
        assert_eq!(invocation.signal, Signal::Unresolved);
        assert!(invocation.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_binding_from_phase_config() {
        let config = crate::config::PhaseConfig::default();
        let binding = ExecutorBinding::from(&config);
        assert_eq!(binding.command, "claude");
        assert_eq!(binding.args, config.args);
    }
}
