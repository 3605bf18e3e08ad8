// src/commands/server.rs

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::ServerArgs;
use crate::config::{BrokerConfig, load_and_validate};
use crate::server::Server;

/// Run the broker until SIGINT or SIGTERM, then drain and exit.
pub async fn run_server(args: ServerArgs) -> Result<i32> {
    let config = resolve_config(&args)?;
    let server = Server::new(config);

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone())?;

    server.serve(shutdown).await?;
    Ok(0)
}

fn resolve_config(args: &ServerArgs) -> Result<BrokerConfig> {
    let mut config = load_and_validate(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("loading config from {}", path.display()),
        None => "building default config".to_string(),
    })?;

    if let Some(socket) = &args.socket {
        config.socket_path = socket.clone();
    }
    if let Some(dir) = &args.scratch_dir {
        config.scratch_dir = dir.clone();
    }
    Ok(config)
}

fn spawn_shutdown_listener(shutdown: CancellationToken) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut interrupt = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    tokio::spawn(async move {
        let name = tokio::select! {
            received = terminate.recv() => received.map(|_| "SIGTERM"),
            received = interrupt.recv() => received.map(|_| "SIGINT"),
        };
        match name {
            Some(name) => info!(signal = name, "shutdown requested"),
            None => error!("signal stream closed; shutting down"),
        }
        shutdown.cancel();
    });
    Ok(())
}
