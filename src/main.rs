//! HTTP capture echo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────┐    ┌──────────────────────┐    ┌──────────┐
//!     ───────────────────▶│   net    │───▶│  backend             │───▶│ capture  │
//!                         │ listener │    │  hyper │ wire        │    │ document │
//!                         └──────────┘    └──────────────────────┘    └────┬─────┘
//!     Client Response                                                       │
//!     ◀─────────────────────────── http::response ◀─────────────────────────┘
//!
//!     Cross-cutting: config, observability, lifecycle (signals, drain)
//! ```

use std::path::PathBuf;

use clap::Parser;

use capture_echo::config::{resolve_config, BackendKind, ConfigOverrides};
use capture_echo::lifecycle::{wait_for_signal, Shutdown};
use capture_echo::net::Listener;
use capture_echo::{observability, CaptureServer};

#[derive(Parser, Debug)]
#[command(name = "capture-echo", version, about = "Echo every HTTP request back as a capture document")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the parsing backend (hyper or wire)
    #[arg(long)]
    backend: Option<BackendKind>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        bind: args.bind,
        backend: args.backend,
    };
    let config = resolve_config(args.config.as_deref(), overrides)?;

    observability::init(&config.observability)?;

    tracing::info!("capture-echo v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend,
        max_connections = config.listener.max_connections,
        max_body_bytes = config.limits.max_body_bytes,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => shutdown.trigger(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                // Dropping the last Shutdown would release the accept loop.
                std::future::pending::<()>().await;
            }
        }
    });

    CaptureServer::new(config).run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
