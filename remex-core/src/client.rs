//! Typed controller-side client.
//!
//! One client holds one connection, and therefore one remote session:
//! directory state set by `execute` persists across calls on the same
//! client and is invisible to other clients. Calls are strictly
//! sequential — each sends one frame and waits for its response before
//! the next is allowed.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::codec::FrameCodec;
use crate::error::AgentError;
use crate::message::{Action, Request, Response};
use crate::protocol::exec::ExecuteResult;
use crate::protocol::transfer::{DirEntry, DownloadResult, ListDirResult};

/// A connected controller client.
pub struct AgentClient {
    framed: Framed<TcpStream, FrameCodec>,
    api_key: String,
}

impl AgentClient {
    /// Connect to an agent.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        api_key: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new()),
            api_key: api_key.into(),
        })
    }

    /// One framed round trip, returning the raw response object.
    ///
    /// `file_info` callers need this: a missing path arrives as
    /// `{success: false}` data rather than an error.
    pub async fn call_raw(&mut self, action: Action, data: Value) -> Result<Value, AgentError> {
        let request = Request::new(action, self.api_key.clone(), data);
        self.framed
            .send(Bytes::from(request.to_bytes()?))
            .await?;

        let frame = self
            .framed
            .next()
            .await
            .ok_or_else(|| AgentError::Other("connection closed before response".to_string()))??;
        Ok(Response::from_bytes(&frame)?.0)
    }

    /// One framed round trip; a `{success: false}` response becomes an
    /// error carrying the agent's message.
    pub async fn call(&mut self, action: Action, data: Value) -> Result<Value, AgentError> {
        let response = self.call_raw(action, data).await?;
        if response.get("success").and_then(Value::as_bool) == Some(true) {
            Ok(response)
        } else {
            let message = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            Err(AgentError::Other(message))
        }
    }

    // ── Convenience wrappers ─────────────────────────────────────

    /// Run a shell command in this client's remote session.
    pub async fn execute(&mut self, command: &str) -> Result<ExecuteResult, AgentError> {
        let response = self
            .call(Action::Execute, serde_json::json!({ "command": command }))
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Single-shot upload of a whole file.
    pub async fn upload(&mut self, path: &str, content: &[u8]) -> Result<u64, AgentError> {
        let response = self
            .call(
                Action::Upload,
                serde_json::json!({ "path": path, "content": b64(content) }),
            )
            .await?;
        Ok(response["size"].as_u64().unwrap_or(0))
    }

    /// Upload one chunk at an offset; returns the cumulative size.
    pub async fn upload_chunk(
        &mut self,
        path: &str,
        chunk: &[u8],
        offset: u64,
        total_size: u64,
    ) -> Result<u64, AgentError> {
        let response = self
            .call(
                Action::Upload,
                serde_json::json!({
                    "path": path,
                    "content": b64(chunk),
                    "offset": offset,
                    "total_size": total_size,
                }),
            )
            .await?;
        Ok(response["size"].as_u64().unwrap_or(0))
    }

    /// Download a whole file, looping chunks until `eof`.
    pub async fn download(&mut self, path: &str) -> Result<Vec<u8>, AgentError> {
        let mut content = Vec::new();
        let mut offset = 0u64;
        loop {
            let response = self
                .call(
                    Action::Download,
                    serde_json::json!({ "path": path, "offset": offset }),
                )
                .await?;
            let chunk: DownloadResult = serde_json::from_value(response)?;
            offset += chunk.content.len() as u64;
            let eof = chunk.eof;
            content.extend_from_slice(&chunk.content);
            if eof || chunk.content.is_empty() {
                return Ok(content);
            }
        }
    }

    /// Stat a path; the raw object preserves the missing-path shape.
    pub async fn file_info(&mut self, path: &str) -> Result<Value, AgentError> {
        self.call_raw(Action::FileInfo, serde_json::json!({ "path": path }))
            .await
    }

    /// List a directory's immediate children.
    pub async fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, AgentError> {
        let response = self
            .call(Action::ListDir, serde_json::json!({ "path": path }))
            .await?;
        let listing: ListDirResult = serde_json::from_value(response)?;
        Ok(listing.items)
    }

    /// Upload a compressed tar stream for extraction into `path`.
    pub async fn tar_upload(&mut self, path: &str, archive: &[u8]) -> Result<u64, AgentError> {
        let response = self
            .call(
                Action::TarUpload,
                serde_json::json!({ "path": path, "content": b64(archive) }),
            )
            .await?;
        Ok(response["size"].as_u64().unwrap_or(0))
    }

    /// Pack a remote directory and return the compressed archive.
    pub async fn tar_download(&mut self, path: &str) -> Result<Vec<u8>, AgentError> {
        let response = self
            .call(Action::TarDownload, serde_json::json!({ "path": path }))
            .await?;
        let encoded = response["content"]
            .as_str()
            .ok_or_else(|| AgentError::Other("missing archive content".to_string()))?;
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        Ok(STANDARD.decode(encoded)?)
    }
}

fn b64(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(bytes)
}
