// src/server/connection.rs

//! One client connection: read a single request, answer it, close.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::errors::{BrokerError, Result};
use crate::output::ChunkSink;
use crate::protocol::{Frame, FrameReader, Process, Request, write_frame};
use crate::server::Supervisor;
use crate::types::{Pid, StreamKind};

/// Writes tailed chunks to the client as `output` frames.
struct FrameSink<'a, W> {
    writer: &'a mut W,
}

impl<W> ChunkSink for FrameSink<'_, W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn send_chunk(&mut self, chunk: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { write_frame(&mut *self.writer, &Frame::Output { data: chunk }).await })
    }
}

/// Serve one connection to completion.
///
/// Errors from the operation itself are reported to the client as an
/// `error` frame; only transport failures are returned.
pub async fn handle_connection<R, W>(supervisor: &Supervisor, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut reader = FrameReader::new(reader);

    let request = match reader.next::<Request>().await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("client closed the connection without a request");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "rejecting malformed request");
            return write_frame(&mut writer, &Frame::from_error(&e)).await;
        }
    };

    let op = request.op();
    debug!(op, ?request, "request received");

    match request {
        Request::CreateProcess { name, args } => {
            let reply = supervisor.create_process(&name, &args);
            write_unary(&mut writer, op, reply).await
        }
        Request::GetProcess { pid } => {
            write_unary(&mut writer, op, supervisor.get_process(pid)).await
        }
        Request::SignalProcess { pid, signal } => {
            let reply = supervisor.signal_process(pid, signal).await;
            write_unary(&mut writer, op, reply).await
        }
        Request::ListProcesses => {
            for process in supervisor.list_processes() {
                write_frame(&mut writer, &Frame::Process { process }).await?;
            }
            write_frame(&mut writer, &Frame::End).await
        }
        Request::Stdout { pid } => {
            serve_tail(supervisor, pid, StreamKind::Stdout, &mut writer).await
        }
        Request::Stderr { pid } => {
            serve_tail(supervisor, pid, StreamKind::Stderr, &mut writer).await
        }
    }
}

async fn write_unary<W>(writer: &mut W, op: &str, reply: Result<Process>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = match reply {
        Ok(process) => Frame::Process { process },
        Err(e) => {
            debug!(op, error = %e, "request failed");
            Frame::from_error(&e)
        }
    };
    write_frame(writer, &frame).await
}

/// Stream a capture file until it is drained or the client goes away.
///
/// A client may half-close after its request and still receives the whole
/// stream. One that disconnects is noticed on the next write, which stops
/// only this tail and releases its file handle.
async fn serve_tail<W>(supervisor: &Supervisor, pid: Pid, kind: StreamKind, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut sink = FrameSink { writer };

    match supervisor.tail(pid, kind, &mut sink).await {
        Ok(bytes) => {
            debug!(pid, stream = %kind, bytes, "tail finished");
            write_frame(sink.writer, &Frame::End).await
        }
        Err(e) if is_transport_error(&e) => {
            debug!(pid, stream = %kind, error = %e, "client went away; tail stopped");
            Err(e)
        }
        Err(e) => {
            debug!(pid, stream = %kind, error = %e, "tail failed");
            write_frame(sink.writer, &Frame::from_error(&e)).await
        }
    }
}

/// Errors raised while writing to the client cannot be reported to it.
fn is_transport_error(err: &BrokerError) -> bool {
    matches!(
        err,
        BrokerError::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use crate::config::BrokerConfig;
    use crate::errors::ErrorCode;

    async fn roundtrip(supervisor: &Supervisor, request: &Request) -> Vec<Frame> {
        let (client, server) = tokio::io::duplex(1024 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (client_read, mut client_write) = tokio::io::split(client);

        write_frame(&mut client_write, request).await.unwrap();
        client_write.shutdown().await.unwrap();
        handle_connection(supervisor, server_read, server_write)
            .await
            .unwrap();

        let mut frames = Vec::new();
        let mut reader = FrameReader::new(client_read);
        while let Some(frame) = reader.next::<Frame>().await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn list_on_an_empty_broker_is_just_end() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(&BrokerConfig::in_dir(dir.path()));
        let frames = roundtrip(&sup, &Request::ListProcesses).await;
        assert_eq!(frames, vec![Frame::End]);
    }

    #[tokio::test]
    async fn unknown_pid_is_an_error_frame() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(&BrokerConfig::in_dir(dir.path()));

        for request in [Request::GetProcess { pid: 7 }, Request::Stdout { pid: 7 }] {
            let frames = roundtrip(&sup, &request).await;
            assert!(matches!(
                frames.as_slice(),
                [Frame::Error { code: ErrorCode::NotFound, .. }]
            ));
        }
    }

    #[tokio::test]
    async fn stdout_is_streamed_then_ended() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrokerConfig::in_dir(dir.path()).with_poll_interval(Duration::from_millis(10));
        let sup = Supervisor::new(&config);
        let created = sup.create_process("echo", &["hello".into()]).unwrap();

        let frames = roundtrip(&sup, &Request::Stdout { pid: created.pid }).await;
        let (last, data) = frames.split_last().unwrap();
        assert_eq!(last, &Frame::End);
        let bytes: Vec<u8> = data
            .iter()
            .flat_map(|f| match f {
                Frame::Output { data } => data.clone(),
                other => panic!("unexpected frame {other:?}"),
            })
            .collect();
        assert_eq!(bytes, b"hello\n");
    }

    #[tokio::test]
    async fn half_closed_client_still_gets_a_live_stream() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrokerConfig::in_dir(dir.path()).with_poll_interval(Duration::from_millis(10));
        let sup = Supervisor::new(&config);
        let created = sup
            .create_process("sh", &["-c".into(), "echo one; sleep 0.2; echo two".into()])
            .unwrap();

        // The process is still running when the request arrives.
        let frames = roundtrip(&sup, &Request::Stdout { pid: created.pid }).await;
        let (last, data) = frames.split_last().unwrap();
        assert_eq!(last, &Frame::End);
        let bytes: Vec<u8> = data
            .iter()
            .flat_map(|f| match f {
                Frame::Output { data } => data.clone(),
                other => panic!("unexpected frame {other:?}"),
            })
            .collect();
        assert_eq!(bytes, b"one\ntwo\n");
    }

    #[tokio::test]
    async fn garbage_request_gets_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(&BrokerConfig::in_dir(dir.path()));

        let input: &[u8] = b"{\"op\":\"explode\"}\n";
        let mut out = Vec::new();
        handle_connection(&sup, input, &mut out).await.unwrap();

        let mut reader = FrameReader::new(out.as_slice());
        let frame = reader.next::<Frame>().await.unwrap().unwrap();
        assert!(matches!(frame, Frame::Error { code: ErrorCode::InvalidRequest, .. }));
    }
}
