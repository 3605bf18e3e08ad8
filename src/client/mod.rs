// src/client/mod.rs

//! Client for a running broker.
//!
//! Every call opens its own connection to the socket, sends one request and
//! reads the reply frames. Errors reported by the broker come back as
//! [`BrokerError::Remote`] with the wire error code preserved.

pub mod execute;

use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedReadHalf;
use tracing::debug;

use crate::errors::{BrokerError, Result};
use crate::protocol::{Frame, FrameReader, Process, Request, write_frame};
use crate::types::{Pid, StreamKind};

pub use execute::Execution;

#[derive(Debug, Clone)]
pub struct BrokerClient {
    socket_path: PathBuf,
}

/// An open request. The write half is shut down once the request is sent.
struct Call {
    frames: FrameReader<OwnedReadHalf>,
}

impl Call {
    async fn next_frame(&mut self) -> Result<Frame> {
        self.frames
            .next::<Frame>()
            .await?
            .ok_or_else(|| BrokerError::Protocol("broker closed the connection mid-reply".into()))
    }
}

impl BrokerClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn create_process(&self, name: &str, args: &[String]) -> Result<Process> {
        self.unary(&Request::CreateProcess {
            name: name.to_string(),
            args: args.to_vec(),
        })
        .await
    }

    pub async fn get_process(&self, pid: Pid) -> Result<Process> {
        self.unary(&Request::GetProcess { pid }).await
    }

    pub async fn signal_process(&self, pid: Pid, signal: i32) -> Result<Process> {
        self.unary(&Request::SignalProcess { pid, signal }).await
    }

    pub async fn list_processes(&self) -> Result<Vec<Process>> {
        let mut call = self.call(&Request::ListProcesses).await?;
        let mut out = Vec::new();
        loop {
            match call.next_frame().await? {
                Frame::Process { process } => out.push(process),
                Frame::End => return Ok(out),
                other => return Err(unexpected(other)),
            }
        }
    }

    /// Copy the process's stdout into `out` until the stream ends.
    pub async fn stdout<W>(&self, pid: Pid, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.tail(StreamKind::Stdout, pid, out).await
    }

    pub async fn stderr<W>(&self, pid: Pid, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.tail(StreamKind::Stderr, pid, out).await
    }

    /// Drain one output stream into `out`.
    ///
    /// Returns the number of bytes written once the broker ends the stream,
    /// or the first error seen.
    pub async fn tail<W>(&self, kind: StreamKind, pid: Pid, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut call = self.call(&Request::tail(kind, pid)).await?;
        let mut written = 0u64;
        loop {
            match call.next_frame().await? {
                Frame::Output { data } => {
                    out.write_all(&data).await?;
                    out.flush().await?;
                    written += data.len() as u64;
                }
                Frame::End => {
                    debug!(pid, stream = %kind, bytes = written, "stream ended");
                    return Ok(written);
                }
                other => return Err(unexpected(other)),
            }
        }
    }

    /// Drain stdout and stderr concurrently; returns after both have ended.
    pub async fn follow_output<O, E>(&self, pid: Pid, out: &mut O, err: &mut E) -> Result<()>
    where
        O: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        tokio::try_join!(self.stdout(pid, out), self.stderr(pid, err))?;
        Ok(())
    }

    async fn unary(&self, request: &Request) -> Result<Process> {
        let mut call = self.call(request).await?;
        match call.next_frame().await? {
            Frame::Process { process } => Ok(process),
            other => Err(unexpected(other)),
        }
    }

    async fn call(&self, request: &Request) -> Result<Call> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| BrokerError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();
        write_frame(&mut writer, request).await?;
        writer.shutdown().await?;
        Ok(Call {
            frames: FrameReader::new(reader),
        })
    }
}

/// Error frames become remote errors; any other frame is out of place.
fn unexpected(frame: Frame) -> BrokerError {
    match frame.into_remote_error() {
        Some(err) => err,
        None => BrokerError::Protocol("unexpected frame in reply".into()),
    }
}
