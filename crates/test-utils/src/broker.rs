//! A real broker on a throwaway socket, for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use procbroker::client::BrokerClient;
use procbroker::config::BrokerConfig;
use procbroker::server::{Server, Supervisor};
use procbroker::types::ServerState;

/// Broker running in the test's runtime, rooted in its own temp dir.
///
/// Dropping it requests shutdown; call [`TestBroker::shutdown`] to wait for
/// the server to stop.
pub struct TestBroker {
    dir: TempDir,
    pub client: BrokerClient,
    pub supervisor: Arc<Supervisor>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<procbroker::errors::Result<()>>>,
    state: watch::Receiver<ServerState>,
}

impl TestBroker {
    /// Start with a 10ms tail poll interval.
    pub async fn start() -> Result<Self> {
        Self::start_with(|config| config).await
    }

    pub async fn start_with<F>(customize: F) -> Result<Self>
    where
        F: FnOnce(BrokerConfig) -> BrokerConfig,
    {
        let dir = tempfile::tempdir().context("creating broker temp dir")?;
        let config = customize(
            BrokerConfig::in_dir(dir.path()).with_poll_interval(Duration::from_millis(10)),
        );
        let socket = config.socket_path.clone();

        let server = Server::new(config);
        let supervisor = server.supervisor();
        let mut state = server.state();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(shutdown.clone()));

        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s >= ServerState::Listening),
        )
        .await
        .context("broker did not start listening")?
        .context("broker state channel closed")?;

        Ok(Self {
            dir,
            client: BrokerClient::new(socket),
            supervisor,
            shutdown,
            handle: Some(handle),
            state,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.client.socket_path().to_path_buf()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ServerState> {
        self.state.clone()
    }

    /// Request shutdown without waiting for it.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Request shutdown and wait for the server to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .context("broker did not stop in time")?
                .context("broker task panicked")??;
        }
        Ok(())
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
