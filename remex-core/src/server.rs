//! Connection dispatcher — accepts connections and serves each on its
//! own task through the framer → router → framer pipeline.
//!
//! Each connection owns its own [`Session`], so two controllers racing
//! on `cd` cannot interleave; there is no shared mutable session state.
//! Within a connection the loop is strictly half-duplex: request N's
//! response is fully written before request N+1 is read. A connection
//! task's failure is logged and never affects another connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::codec::{FrameCodec, MAX_FRAME_SIZE};
use crate::error::AgentError;
use crate::protocol::transfer::DEFAULT_CHUNK_SIZE;
use crate::router::Router;
use crate::session::{Session, SessionOptions};
use crate::transfer::TransferEngine;

// ── ServerConfig ─────────────────────────────────────────────────

/// Runtime configuration for an [`AgentServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The shared secret every request must present.
    pub api_key: String,

    /// Execution ceiling per shell command.
    pub exec_timeout: Duration,

    /// Output line ceiling before truncation.
    pub max_output_lines: usize,

    /// Download chunk size when the request does not specify one.
    pub default_chunk_size: u64,

    /// Frame size ceiling for the codec.
    pub max_frame_size: usize,
}

impl ServerConfig {
    /// Defaults for everything but the required secret.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            exec_timeout: Duration::from_secs(30),
            max_output_lines: 50,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

// ── AgentServer ──────────────────────────────────────────────────

/// The listening agent: accept loop plus per-connection serving tasks.
pub struct AgentServer {
    listener: TcpListener,
    router: Arc<Router>,
    config: ServerConfig,
}

impl AgentServer {
    /// Bind the listener and prepare the router.
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> Result<Self, AgentError> {
        let listener = TcpListener::bind(addr).await?;
        let transfer = TransferEngine::new(config.default_chunk_size);
        let router = Arc::new(Router::new(config.api_key.clone(), transfer));
        Ok(Self {
            listener,
            router,
            config,
        })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, AgentError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails. Intended to be
    /// spawned or raced against a shutdown signal.
    pub async fn run(self) -> Result<(), AgentError> {
        info!(addr = %self.listener.local_addr()?, "agent listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let router = Arc::clone(&self.router);
            let config = self.config.clone();
            tokio::spawn(async move {
                debug!(%peer, "connection accepted");
                if let Err(e) = serve_connection(stream, router, &config).await {
                    warn!(%peer, error = %e, "connection ended with error");
                }
                debug!(%peer, "connection closed");
            });
        }
    }
}

/// Serve one connection: frame in, route, frame out, until the peer
/// closes.
async fn serve_connection(
    stream: TcpStream,
    router: Arc<Router>,
    config: &ServerConfig,
) -> Result<(), AgentError> {
    let codec = FrameCodec::with_max_frame(config.max_frame_size);
    let mut framed = Framed::new(stream, codec);
    let mut session = Session::with_options(SessionOptions {
        exec_timeout: config.exec_timeout,
        max_output_lines: config.max_output_lines,
    });

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let response = router.route(&mut session, &frame).await;
        let payload = response.to_bytes()?;
        // The full response is flushed before the next read; a partial
        // write never precedes close.
        framed.send(Bytes::from(payload)).await?;
    }
    Ok(())
}
