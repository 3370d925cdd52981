//! Shell execution payloads.

use serde::{Deserialize, Serialize};

/// `data` payload for the `execute` action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteData {
    /// The shell command to run in the session.
    pub command: String,
}

/// Result fields for a completed `execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteResult {
    /// Combined output: stdout followed by stderr, truncated past the
    /// line ceiling. Interleaving order between the two streams is lost.
    pub output: String,

    /// The session's working directory after the command.
    pub cwd: String,
}
