//! Request/response envelopes and the action enumeration.
//!
//! One JSON object per frame:
//!
//! ```text
//! Controller ──► Agent
//!   { "action": "execute" | "upload" | "download" | "file_info"
//!             | "list_dir" | "tar_upload" | "tar_download",
//!     "api_key": "<shared secret>",
//!     "data": { ...action-specific... } }
//!
//! Agent ──► Controller
//!   { "success": true, ...action-specific fields }
//!   { "success": false, "error": "<message>" }
//! ```
//!
//! `action` defaults to `execute` when absent, and the legacy flat form
//! `{ "command": "...", "api_key": "..." }` is still accepted for it.
//! Dispatch happens on the closed [`Action`] enum — an unhandled action
//! is a compile-time gap, not a runtime string fallthrough.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::AgentError;

// ── Action ───────────────────────────────────────────────────────

/// All actions the agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Run a shell command in the connection's persistent session.
    Execute,
    /// Write a file (whole or chunked at an offset).
    Upload,
    /// Read a file chunk.
    Download,
    /// Stat a path.
    FileInfo,
    /// List a directory's immediate children.
    ListDir,
    /// Extract an uploaded compressed tar stream into a directory.
    TarUpload,
    /// Pack a directory into a compressed tar stream.
    TarDownload,
}

impl Action {
    /// The wire name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Execute => "execute",
            Action::Upload => "upload",
            Action::Download => "download",
            Action::FileInfo => "file_info",
            Action::ListDir => "list_dir",
            Action::TarUpload => "tar_upload",
            Action::TarDownload => "tar_download",
        }
    }
}

impl TryFrom<&str> for Action {
    type Error = AgentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "execute" => Ok(Action::Execute),
            "upload" => Ok(Action::Upload),
            "download" => Ok(Action::Download),
            "file_info" => Ok(Action::FileInfo),
            "list_dir" => Ok(Action::ListDir),
            "tar_upload" => Ok(Action::TarUpload),
            "tar_download" => Ok(Action::TarDownload),
            other => Err(AgentError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Request ──────────────────────────────────────────────────────

/// A decoded request envelope.
///
/// `action` stays a string until after authentication so that nothing
/// action-specific is interpreted before the secret is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Action name; absent means `execute`.
    #[serde(default = "default_action")]
    pub action: String,

    /// Shared secret; checked before any other field is read.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Action-specific payload.
    #[serde(default)]
    pub data: Value,

    /// Legacy flat form: `{"command": "...", "api_key": "..."}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

fn default_action() -> String {
    "execute".to_string()
}

impl Request {
    /// Build a request for the given action and payload.
    pub fn new(action: Action, api_key: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.as_str().to_string(),
            api_key: Some(api_key.into()),
            data,
            command: None,
        }
    }

    /// Decode a request from a frame payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AgentError> {
        serde_json::from_slice(bytes).map_err(|e| AgentError::Framing(e.to_string()))
    }

    /// Encode to a frame payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AgentError> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ── Response ─────────────────────────────────────────────────────

/// A response envelope: `{success, ...}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response(pub Value);

impl Response {
    /// A success response with the handler's fields merged in.
    ///
    /// `success` is only inserted when the handler did not set it
    /// itself: `file_info` reports a missing path as
    /// `{success: false, error}` *data* through this channel.
    pub fn ok(fields: Value) -> Self {
        let mut map = match fields {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        map.entry("success").or_insert(Value::Bool(true));
        Response(Value::Object(map))
    }

    /// A failure response carrying the error's display text.
    pub fn failure(error: impl fmt::Display) -> Self {
        Response(serde_json::json!({
            "success": false,
            "error": error.to_string(),
        }))
    }

    /// Whether this response reports success.
    pub fn is_success(&self) -> bool {
        self.0.get("success").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Encode to a frame payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AgentError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Decode a response from a frame payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AgentError> {
        Ok(Response(serde_json::from_slice(bytes)?))
    }
}

// ── Tests ─────────────────────────────────────────────────────────
