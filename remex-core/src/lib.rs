//! # remex-core
//!
//! Core library for the remex remote execution agent.
//!
//! This crate contains:
//! - **Codec**: [`FrameCodec`] — length-prefixed framing via `tokio_util`
//! - **Messages**: [`Request`], [`Response`], and the closed [`Action`] enum
//! - **Protocol payloads**: typed per-action request/result structs
//! - **Session**: persistent working-directory/environment shell state
//! - **Transfer**: chunked file I/O and tar archive pack/unpack
//! - **Router**: auth-first dispatch with uniform error conversion
//! - **Server**: the accept loop serving one session per connection
//! - **Client**: typed controller-side wrapper used by tests and tools
//! - **Error**: [`AgentError`] — typed, `thiserror`-based error hierarchy

pub mod client;
pub mod codec;
pub mod error;
pub mod message;
pub mod protocol;
pub mod router;
pub mod server;
pub mod session;
pub mod transfer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::AgentClient;
pub use codec::{FrameCodec, LEN_PREFIX_SIZE, MAX_FRAME_SIZE};
pub use error::AgentError;
pub use message::{Action, Request, Response};
pub use router::Router;
pub use server::{AgentServer, ServerConfig};
pub use session::{Session, SessionOptions};
pub use transfer::TransferEngine;

/// Documented default listening port (high, non-privileged).
pub const DEFAULT_PORT: u16 = 38888;
