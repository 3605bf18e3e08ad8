// src/server/mod.rs

//! Broker server: socket listener, connection tasks and shutdown sequencing.
//!
//! Lifecycle: `Idle -> Listening -> Draining -> Stopped`.
//!
//! - `Listening`: the socket is bound (a stale socket file is replaced) and
//!   connections are accepted, each on its own task.
//! - `Draining`: entered when the shutdown token is cancelled. No new
//!   connections are accepted; in-flight requests, including tails, run to
//!   completion (bounded by `drain_timeout` when configured).
//! - `Stopped`: the socket file is removed and the broker's own background
//!   tasks are stopped. Spawned processes are left running.

pub mod connection;
pub mod supervisor;
pub mod sweeper;

use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::errors::{BrokerError, Result};
use crate::types::ServerState;

pub use connection::handle_connection;
pub use supervisor::Supervisor;
pub use sweeper::spawn_sweeper;

pub struct Server {
    config: BrokerConfig,
    supervisor: Arc<Supervisor>,
    state: watch::Sender<ServerState>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("socket", &self.config.socket_path)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Server {
    pub fn new(config: BrokerConfig) -> Self {
        let supervisor = Arc::new(Supervisor::new(&config));
        let (state, _) = watch::channel(ServerState::Idle);
        Self {
            config,
            supervisor,
            state,
        }
    }

    pub fn supervisor(&self) -> Arc<Supervisor> {
        Arc::clone(&self.supervisor)
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Run the server until `shutdown` is cancelled and draining finishes.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let socket_path = self.config.socket_path.clone();

        remove_stale_socket(&socket_path)?;
        std::fs::create_dir_all(&self.config.scratch_dir).map_err(|source| {
            BrokerError::ScratchFile {
                dir: self.config.scratch_dir.clone(),
                source,
            }
        })?;
        let listener = UnixListener::bind(&socket_path)?;

        let sweeper_stop = CancellationToken::new();
        let sweeper = spawn_sweeper(
            Arc::clone(&self.supervisor),
            self.config.retention.clone(),
            sweeper_stop.clone(),
        );

        self.transition(ServerState::Listening);
        info!(socket = %socket_path.display(), scratch_dir = %self.config.scratch_dir.display(), "broker listening");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let supervisor = Arc::clone(&self.supervisor);
                        connections.spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) = handle_connection(&supervisor, reader, writer).await {
                                debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "connection task panicked");
                    }
                }
            }
        }

        self.transition(ServerState::Draining);
        drop(listener);
        info!(in_flight = connections.len(), "broker draining");
        self.drain(&mut connections).await;

        sweeper_stop.cancel();
        if let Some(handle) = sweeper {
            let _ = handle.await;
        }
        self.supervisor.detach_all();

        if let Err(e) = std::fs::remove_file(&socket_path) {
            warn!(socket = %socket_path.display(), error = %e, "failed to remove socket file");
        }
        self.transition(ServerState::Stopped);
        info!("broker stopped");
        Ok(())
    }

    async fn drain(&self, connections: &mut JoinSet<()>) {
        let wait_all = async {
            while connections.join_next().await.is_some() {}
        };

        match self.config.drain_timeout {
            None => wait_all.await,
            Some(limit) => {
                if tokio::time::timeout(limit, wait_all).await.is_err() {
                    warn!(
                        remaining = connections.len(),
                        ?limit,
                        "drain timeout reached; aborting in-flight requests"
                    );
                    connections.abort_all();
                    while connections.join_next().await.is_some() {}
                }
            }
        }
    }

    fn transition(&self, next: ServerState) {
        self.state.send_if_modified(|current| {
            if next <= *current {
                return false;
            }
            debug!(from = ?*current, to = ?next, "server state");
            *current = next;
            true
        });
    }
}

/// Remove a leftover socket from a previous run.
///
/// Anything at the path that is not a socket is left alone and reported.
fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            info!(socket = %path.display(), "removing stale socket");
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(BrokerError::Config(format!(
            "socket path {} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
