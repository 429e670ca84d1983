//! Custom error types for ralphex.
//!
//! This module provides structured error types that distinguish fatal
//! preconditions, process-level faults, and cancellation from ordinary
//! iteration failures (which are handled by retry, not by error values).

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ralphex operations.
#[derive(Error, Debug)]
pub enum RalphexError {
    // =========================================================================
    // Configuration / precondition errors
    // =========================================================================
    /// Failed to load or parse configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Missing required external tool
    #[error("{tool} not found in PATH")]
    MissingTool { tool: String },

    /// Plan file does not exist
    #[error("plan file not found: {}", path.display())]
    PlanNotFound { path: PathBuf },

    /// Plan file required but none supplied or selectable
    #[error("plan file required for task execution")]
    PlanRequired,

    /// Git operation failed
    #[error("Git operation failed: {operation} - {message}")]
    Git { operation: String, message: String },

    // =========================================================================
    // Process-level faults
    // =========================================================================
    /// Executor could not start or drive the agent subprocess
    #[error("Executor failed in {phase} iteration {iteration}: {message}")]
    Executor {
        phase: String,
        iteration: u32,
        message: String,
    },

    /// Progress log could not be opened or written
    #[error("Progress log error: {message}")]
    ProgressLog { message: String },

    // =========================================================================
    // Wrapped errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RalphexError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with the offending path.
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a git error.
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an executor fault with phase/iteration context.
    pub fn executor(phase: impl Into<String>, iteration: u32, message: impl Into<String>) -> Self {
        Self::Executor {
            phase: phase.into(),
            iteration,
            message: message.into(),
        }
    }

    /// Create a progress log error.
    pub fn progress_log(message: impl Into<String>) -> Self {
        Self::ProgressLog {
            message: message.into(),
        }
    }

    /// Check if this error is a precondition failure (reported before any
    /// phase starts, never retried).
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::MissingTool { .. }
                | Self::PlanNotFound { .. }
                | Self::PlanRequired
        )
    }

    /// Get error code for exit status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingTool { .. } => 6,
            Self::Config { .. } => 7,
            Self::PlanNotFound { .. } | Self::PlanRequired => 2,
            _ => 1,
        }
    }
}

/// Type alias for ralphex results.
pub type Result<T> = std::result::Result<T, RalphexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RalphexError::MissingTool {
            tool: "claude".into(),
        };
        assert_eq!(err.to_string(), "claude not found in PATH");
    }

    #[test]
    fn test_executor_context_in_message() {
        let err = RalphexError::executor("task", 3, "spawn failed");
        let msg = err.to_string();
        assert!(msg.contains("task"));
        assert!(msg.contains('3'));
        assert!(msg.contains("spawn failed"));
    }

    #[test]
    fn test_is_precondition() {
        assert!(RalphexError::config("bad").is_precondition());
        assert!(RalphexError::PlanRequired.is_precondition());
        assert!(!RalphexError::progress_log("disk full").is_precondition());
        assert!(!RalphexError::executor("task", 1, "boom").is_precondition());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            RalphexError::MissingTool { tool: "git".into() }.exit_code(),
            6
        );
        assert_eq!(RalphexError::config("bad").exit_code(), 7);
        assert_eq!(RalphexError::PlanRequired.exit_code(), 2);
        assert_eq!(RalphexError::progress_log("x").exit_code(), 1);
    }

    #[test]
    fn test_config_with_path() {
        let path = PathBuf::from("/tmp/.ralphex.toml");
        let err = RalphexError::config_with_path("parse failed", path.clone());
        if let RalphexError::Config { message, path: p } = err {
            assert_eq!(message, "parse failed");
            assert_eq!(p, Some(path));
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: RalphexError = io_err.into();
        assert!(matches!(err, RalphexError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
