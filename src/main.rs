//! luaserve
//!
//! Serves HTTP requests by calling functions registered from a Lua script.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ http server ──▶ dispatcher ──▶ routing        │
//!                           │   (request id,        │          (registry)      │
//!                           │    limits)            ▼                          │
//!                           │                 bounded queue                    │
//!                           │                       │                          │
//!                           │                       ▼                          │
//!     Client Response       │                 engine thread                    │
//!     ◀─────────────────────┼── response ◀── (Lua state, one call at a time)  │
//!                           └──────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `luaserve [PORT] [--script PATH] [--config FILE] [--host HOST]`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use luaserve::config::{load_config, ConfigError, ConfigOverrides, ServerConfig};
use luaserve::lifecycle::{signals, ServerContext, Shutdown};
use luaserve::observability::{init_logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "luaserve", version)]
#[command(about = "Serve HTTP routes defined by a Lua script", long_about = None)]
struct Cli {
    /// Port to listen on [default: 8080]
    port: Option<u16>,

    /// Script that registers the routes [default: app.lua]
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host or IP to bind [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,
}

/// Config file (if any), then command-line overrides, then validation.
fn resolve_config(cli: &Cli) -> Result<ServerConfig, ConfigError> {
    let overrides = ConfigOverrides {
        port: cli.port,
        host: cli.host.clone(),
        script: cli.script.clone(),
    };
    load_config(cli.config.as_deref(), &overrides)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability.log_level);
    tracing::info!("luaserve v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        script = %config.script.path.display(),
        invoke_timeout_ms = config.script.invoke_timeout_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let context = match ServerContext::start(&config).await {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::forward_signals(shutdown.clone()));

    match context.run(shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
