//! Action router — authenticates the shared secret, dispatches a
//! decoded request to the session or transfer engine, and converts the
//! result or error into a response value.
//!
//! Ordering contract: the api key is checked before any other request
//! field is interpreted, so an unauthenticated request can never cause
//! a filesystem or process side effect. Every handler failure is caught
//! here and becomes `{success: false, error}` — nothing crosses the
//! router boundary.

use serde_json::Value;
use tracing::debug;

use crate::error::AgentError;
use crate::message::{Action, Request, Response};
use crate::protocol::exec::ExecuteData;
use crate::protocol::transfer::{DownloadData, PathData, TarUploadData, UploadData};
use crate::session::Session;
use crate::transfer::TransferEngine;

/// Routes authenticated requests to their handlers.
#[derive(Debug, Clone)]
pub struct Router {
    api_key: String,
    transfer: TransferEngine,
}

impl Router {
    pub fn new(api_key: impl Into<String>, transfer: TransferEngine) -> Self {
        Self {
            api_key: api_key.into(),
            transfer,
        }
    }

    /// Decode, authenticate, and dispatch one frame payload.
    ///
    /// Always returns a response; errors become failure responses.
    pub async fn route(&self, session: &mut Session, raw: &[u8]) -> Response {
        let request = match Request::from_bytes(raw) {
            Ok(request) => request,
            Err(e) => return Response::failure(e),
        };

        match self.dispatch(session, request).await {
            Ok(fields) => Response::ok(fields),
            Err(e) => Response::failure(e),
        }
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        request: Request,
    ) -> Result<Value, AgentError> {
        // Authenticate before reading anything action-specific.
        if request.api_key.as_deref() != Some(self.api_key.as_str()) {
            return Err(AgentError::Auth);
        }

        let action = Action::try_from(request.action.as_str())?;
        debug!(%action, "dispatching request");

        match action {
            Action::Execute => {
                let command = execute_command(&request)?;
                let result = session.execute(&command).await?;
                Ok(serde_json::to_value(result)?)
            }
            Action::Upload => {
                let data: UploadData = decode_data(request.data)?;
                let result = self.transfer.upload(data).await?;
                Ok(serde_json::to_value(result)?)
            }
            Action::Download => {
                let data: DownloadData = decode_data(request.data)?;
                let result = self.transfer.download(data).await?;
                Ok(serde_json::to_value(result)?)
            }
            Action::FileInfo => {
                let data: PathData = decode_data(request.data)?;
                // Missing paths are reported as data, not through the
                // error channel — the one action with that shape.
                match self.transfer.stat(&data.path).await? {
                    Some(stat) => Ok(serde_json::to_value(stat)?),
                    None => Ok(serde_json::json!({
                        "success": false,
                        "error": format!("path not found: {}", data.path),
                    })),
                }
            }
            Action::ListDir => {
                let data: PathData = decode_data(request.data)?;
                let result = self.transfer.list(&data.path).await?;
                Ok(serde_json::to_value(result)?)
            }
            Action::TarUpload => {
                let data: TarUploadData = decode_data(request.data)?;
                let result = self.transfer.tar_unpack(&data.path, data.content).await?;
                Ok(serde_json::to_value(result)?)
            }
            Action::TarDownload => {
                let data: PathData = decode_data(request.data)?;
                let content = self.transfer.tar_pack(&data.path).await?;
                let size = content.len() as u64;
                Ok(serde_json::json!({
                    "content": base64_encode(&content),
                    "size": size,
                }))
            }
        }
    }
}

/// The command for `execute`: `data.command`, or the legacy flat
/// `command` field.
fn execute_command(request: &Request) -> Result<String, AgentError> {
    if let Ok(data) = serde_json::from_value::<ExecuteData>(request.data.clone()) {
        return Ok(data.command);
    }
    request
        .command
        .clone()
        .ok_or_else(|| AgentError::InvalidRequest("missing command".to_string()))
}

fn decode_data<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, AgentError> {
    serde_json::from_value(data).map_err(|e| AgentError::InvalidRequest(e.to_string()))
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(bytes)
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new("secret", TransferEngine::default())
    }

    fn raw(json: &str) -> Vec<u8> {
        json.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn wrong_api_key_fails_without_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never-created.txt");

        let body = serde_json::json!({
            "action": "upload",
            "api_key": "wrong",
            "data": { "path": target.display().to_string(), "content": "aGVsbG8=" },
        });
        let mut session = Session::new();
        let resp = router()
            .route(&mut session, &serde_json::to_vec(&body).unwrap())
            .await;

        assert!(!resp.is_success());
        assert!(resp.0["error"].as_str().unwrap().contains("api key"));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn missing_api_key_rejected() {
        let mut session = Session::new();
        let resp = router()
            .route(&mut session, &raw(r#"{"action":"execute","data":{"command":"true"}}"#))
            .await;
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn unknown_action_rejected() {
        let mut session = Session::new();
        let resp = router()
            .route(
                &mut session,
                &raw(r#"{"action":"frobnicate","api_key":"secret"}"#),
            )
            .await;
        assert!(!resp.is_success());
        assert!(resp.0["error"].as_str().unwrap().contains("unknown action"));
    }

    #[tokio::test]
    async fn malformed_payload_is_framing_error() {
        let mut session = Session::new();
        let resp = router().route(&mut session, b"{not json").await;
        assert!(!resp.is_success());
        assert!(resp.0["error"].as_str().unwrap().contains("framing"));
    }

    #[tokio::test]
    async fn execute_via_data_object() {
        let mut session = Session::new();
        let resp = router()
            .route(
                &mut session,
                &raw(r#"{"action":"execute","api_key":"secret","data":{"command":"echo hi"}}"#),
            )
            .await;
        assert!(resp.is_success());
        assert_eq!(resp.0["output"], "hi");
    }

    #[tokio::test]
    async fn execute_via_legacy_flat_form() {
        let mut session = Session::new();
        let resp = router()
            .route(&mut session, &raw(r#"{"command":"echo legacy","api_key":"secret"}"#))
            .await;
        assert!(resp.is_success());
        assert_eq!(resp.0["output"], "legacy");
    }

    #[tokio::test]
    async fn execute_without_command_is_invalid() {
        let mut session = Session::new();
        let resp = router()
            .route(&mut session, &raw(r#"{"action":"execute","api_key":"secret"}"#))
            .await;
        assert!(!resp.is_success());
        assert!(resp.0["error"].as_str().unwrap().contains("command"));
    }

    #[tokio::test]
    async fn upload_missing_path_field_is_invalid_request() {
        let mut session = Session::new();
        let resp = router()
            .route(
                &mut session,
                &raw(r#"{"action":"upload","api_key":"secret","data":{}}"#),
            )
            .await;
        assert!(!resp.is_success());
        assert!(resp.0["error"].as_str().unwrap().contains("invalid request"));
    }

    #[tokio::test]
    async fn file_info_missing_path_reports_failure_as_data() {
        let mut session = Session::new();
        let resp = router()
            .route(
                &mut session,
                &raw(
                    r#"{"action":"file_info","api_key":"secret","data":{"path":"/definitely/not/here"}}"#,
                ),
            )
            .await;
        // Delivered through the success channel with success=false.
        assert!(!resp.is_success());
        assert!(resp.0["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn file_info_existing_path_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"abc").unwrap();

        let body = serde_json::json!({
            "action": "file_info",
            "api_key": "secret",
            "data": { "path": path.display().to_string() },
        });
        let mut session = Session::new();
        let resp = router()
            .route(&mut session, &serde_json::to_vec(&body).unwrap())
            .await;
        assert!(resp.is_success());
        assert_eq!(resp.0["size"], 3);
        assert_eq!(resp.0["is_file"], true);
    }
}
