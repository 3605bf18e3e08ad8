// src/commands/signal_proxy.rs

//! Forward SIGINT and SIGTERM received by the client to a brokered process.
//!
//! Forwarding stops at the first delivery error. After that the next
//! SIGINT or SIGTERM terminates the client itself, with the conventional
//! `128 + signal` exit code.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::BrokerClient;
use crate::types::Pid;

#[derive(Debug)]
pub struct SignalProxy {
    handle: JoinHandle<()>,
}

impl SignalProxy {
    pub fn spawn(client: BrokerClient, pid: Pid) -> Result<Self> {
        let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let mut interrupt = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

        let handle = tokio::spawn(async move {
            let mut forwarding = true;
            loop {
                let signo = tokio::select! {
                    Some(()) = terminate.recv() => SignalKind::terminate().as_raw_value(),
                    Some(()) = interrupt.recv() => SignalKind::interrupt().as_raw_value(),
                    else => break,
                };

                if !forwarding {
                    std::process::exit(128 + signo);
                }

                match client.signal_process(pid, signo).await {
                    Ok(process) => debug!(pid, signal = signo, state = %process.state, "forwarded signal"),
                    Err(e) => {
                        warn!(pid, signal = signo, error = %e, "signal forwarding failed; forwarding stopped");
                        forwarding = false;
                    }
                }
            }
        });

        Ok(Self { handle })
    }
}

impl Drop for SignalProxy {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
