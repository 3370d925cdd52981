//! remex agent — entry point.
//!
//! ```text
//! remex-agent                    Run in the foreground
//! remex-agent --config <path>    Load a custom config TOML
//! remex-agent --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use remex_agent::config::{AgentConfig, API_KEY_ENV};
use remex_core::AgentServer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "remex-agent", about = "remex remote execution agent")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "remex-agent.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&AgentConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = AgentConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // The shared secret is required; absence is a startup failure.
    let Some(api_key) = config.effective_api_key() else {
        eprintln!(
            "no shared secret configured: set {API_KEY_ENV} or add api_key to {}",
            cli.config.display()
        );
        std::process::exit(1);
    };

    info!("remex-agent v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.listen_addr());
    info!("exec timeout: {}s", config.limits.exec_timeout_secs);

    let server = AgentServer::bind(config.listen_addr(), config.to_server_config(api_key)).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received — shutting down");
        }
    }

    Ok(())
}
