//! # remex-agent — Remote Execution Agent Service
//!
//! Long-running process that listens on a fixed TCP port, authenticates
//! a shared secret, and serves shell execution, file transfer, and
//! directory archive requests through `remex-core`.
//!
//! The secret is required configuration: `REMEX_API_KEY` in the
//! environment or `api_key` in the config file. Without one the agent
//! exits at startup instead of falling back to anything built in.

pub mod config;
