//! Configuration for the remex agent.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the shared secret.
pub const API_KEY_ENV: &str = "REMEX_API_KEY";

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Shared secret; usually supplied via `REMEX_API_KEY` instead.
    /// There is no built-in default — an agent without a secret
    /// refuses to start.
    pub api_key: Option<String>,
    /// Network settings.
    pub network: NetworkConfig,
    /// Execution and transfer limits.
    pub limits: LimitsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind.
    pub bind: String,
    /// TCP port to listen on.
    pub port: u16,
}

/// Execution and transfer limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Shell command execution ceiling in seconds.
    pub exec_timeout_secs: u64,
    /// Output lines kept before truncation.
    pub max_output_lines: usize,
    /// Default download chunk size in bytes.
    pub default_chunk_size: u64,
    /// Frame size ceiling in bytes.
    pub max_frame_size: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: remex_core::DEFAULT_PORT,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            exec_timeout_secs: 30,
            max_output_lines: 50,
            default_chunk_size: 1024 * 1024,
            max_frame_size: remex_core::MAX_FRAME_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl AgentConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// The effective shared secret: environment first, then the
    /// config file. `None` means the agent must refuse to start.
    pub fn effective_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.is_empty()))
    }

    /// The listen address string.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }

    /// Convert into the core server configuration.
    pub fn to_server_config(&self, api_key: String) -> remex_core::ServerConfig {
        remex_core::ServerConfig {
            api_key,
            exec_timeout: Duration::from_secs(self.limits.exec_timeout_secs.max(1)),
            max_output_lines: self.limits.max_output_lines.max(1),
            default_chunk_size: self.limits.default_chunk_size.max(1),
            max_frame_size: self.limits.max_frame_size.max(1024),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
