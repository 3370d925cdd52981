//! Domain-specific error types for the remex agent.
//!
//! All fallible operations return `Result<T, AgentError>`.
//! No panics on invalid input — every error is typed and recoverable.
//! Handler-level errors are converted to `{success: false, error}` responses
//! at the router; none escape to crash a connection task.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the remex agent.
#[derive(Debug, Error)]
pub enum AgentError {
    // ── Request Errors ───────────────────────────────────────────
    /// The shared secret is missing or does not match.
    #[error("invalid or missing api key")]
    Auth,

    /// The request named an action the agent does not implement.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A required field is missing or has the wrong shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ── Filesystem Errors ────────────────────────────────────────
    /// The requested path does not exist.
    #[error("path not found: {0}")]
    NotFound(String),

    /// A directory listing was requested on a non-directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    // ── Execution Errors ─────────────────────────────────────────
    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The command interpreter could not be started or waited on.
    #[error("execution failed: {0}")]
    Execution(String),

    /// An external archive process (tar) exited non-zero.
    #[error("archive operation failed: {0}")]
    Archive(String),

    // ── Framing Errors ───────────────────────────────────────────
    /// The payload did not decode as a well-formed request.
    #[error("framing error: {0}")]
    Framing(String),

    /// A frame exceeded the configured size ceiling.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Transport / Serialization Errors ─────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding of a payload failed.
    #[error("encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Base64 decoding of a binary payload failed.
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for AgentError {
    fn from(s: String) -> Self {
        AgentError::Other(s)
    }
}

impl From<&str> for AgentError {
    fn from(s: &str) -> Self {
        AgentError::Other(s.to_string())
    }
}
