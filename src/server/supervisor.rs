// src/server/supervisor.rs

//! The operations the broker serves, independent of the socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BrokerConfig, RetentionPolicy};
use crate::errors::{BrokerError, Result};
use crate::exec::{deliver_signal, spawn_process};
use crate::output::{ChunkSink, Tailer};
use crate::protocol::Process;
use crate::registry::{ProcessRecord, Registry};
use crate::types::{Pid, StreamKind};

/// Owns the registry and the root scope every spawned process runs under.
#[derive(Debug)]
pub struct Supervisor {
    registry: Registry,
    scratch_dir: PathBuf,
    poll_interval: Duration,
    chunk_size: usize,
    root_scope: CancellationToken,
}

impl Supervisor {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            registry: Registry::new(),
            scratch_dir: config.scratch_dir.clone(),
            poll_interval: config.poll_interval,
            chunk_size: config.chunk_size,
            root_scope: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Start a process and register it. Returns as soon as the OS has
    /// confirmed the start.
    pub fn create_process(&self, name: &str, args: &[String]) -> Result<Process> {
        let record = spawn_process(name, args, &self.scratch_dir, &self.root_scope)?;
        let process = record.to_process();
        self.registry.store(record.pid(), record);
        Ok(process)
    }

    pub fn get_process(&self, pid: Pid) -> Result<Process> {
        Ok(self.lookup(pid)?.to_process())
    }

    /// Current state of every record, in no particular order.
    pub fn list_processes(&self) -> Vec<Process> {
        let mut out = Vec::with_capacity(self.registry.len());
        self.registry.range(|record| out.push(record.to_process()));
        out
    }

    pub async fn signal_process(&self, pid: Pid, signal: i32) -> Result<Process> {
        let record = self.lookup(pid)?;
        deliver_signal(&record, signal).await
    }

    /// Stream one of the process's capture files into `sink` from the start.
    pub async fn tail<S>(&self, pid: Pid, kind: StreamKind, sink: &mut S) -> Result<u64>
    where
        S: ChunkSink + ?Sized,
    {
        let record = self.lookup(pid)?;
        let tailer = Tailer::new(
            record.output_path(kind),
            record.completion().clone(),
            self.poll_interval,
            self.chunk_size,
        );
        drop(record);
        tailer.run(sink).await
    }

    /// Evict completed records older than the policy's TTL.
    ///
    /// Returns how many records were removed. Without a TTL nothing is ever
    /// evicted.
    pub async fn sweep_expired(&self, policy: &RetentionPolicy) -> usize {
        let Some(ttl) = policy.completed_ttl else {
            return 0;
        };

        let expired: Vec<Arc<ProcessRecord>> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|record| {
                record
                    .completion()
                    .outcome()
                    .is_some_and(|outcome| outcome.finished_at.elapsed() >= ttl)
            })
            .collect();

        let mut evicted = 0;
        for record in &expired {
            if self.registry.remove_if_current(record).is_none() {
                continue;
            }
            evicted += 1;
            debug!(pid = record.pid(), cmd = %record.command(), "evicted completed process");

            if policy.remove_scratch_files {
                for path in [record.stdout_path(), record.stderr_path()] {
                    match tokio::fs::remove_file(path).await {
                        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                            warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                        }
                        _ => {}
                    }
                }
            }
        }

        if evicted > 0 {
            info!(evicted, remaining = self.registry.len(), "retention sweep");
        }
        evicted
    }

    /// Stop supervising: every watcher detaches, children keep running.
    pub fn detach_all(&self) {
        let running = self
            .registry
            .snapshot()
            .iter()
            .filter(|record| !record.completion().is_fired())
            .count();
        if running > 0 {
            info!(running, "leaving running processes behind");
        }
        self.root_scope.cancel();
    }

    fn lookup(&self, pid: Pid) -> Result<Arc<ProcessRecord>> {
        self.registry.load(pid).ok_or(BrokerError::NotFound(pid))
    }
}
