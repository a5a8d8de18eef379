//! Error types for sandbox session orchestration.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for session operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The workspace path does not exist or is not a directory.
    #[error("workspace directory does not exist: {0}")]
    InvalidWorkspace(PathBuf),

    /// A prompt file was given but does not exist.
    #[error("prompt file does not exist: {0}")]
    PromptFileMissing(PathBuf),

    /// A task was dispatched to a session that is not running.
    #[error("session '{name}' not found{}", format_running(running))]
    SessionNotFound {
        name: String,
        /// Names of currently running sessions, for diagnostics.
        running: Vec<String>,
    },

    /// The container runtime returned a non-zero exit code.
    #[error("runtime command failed: {command}: {detail}")]
    RuntimeCommandFailed { command: String, detail: String },

    /// The session template has not been built yet.
    #[error("session template not found at {0}; run setup first to create it")]
    TemplateMissing(PathBuf),

    /// A freshly started session never reported a running status.
    #[error("session '{0}' did not become ready in time")]
    SessionNotReady(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error during session operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_running(running: &[String]) -> String {
    if running.is_empty() {
        String::from(" (no sessions are running)")
    } else {
        format!(" (running sessions: {})", running.join(", "))
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
