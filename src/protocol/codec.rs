// src/protocol/codec.rs

//! Newline-delimited JSON framing over any async byte stream.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::errors::{BrokerError, Result};

/// Upper bound for a single encoded frame.
///
/// A full 4 MiB output chunk grows by a third when base64 encoded, so this
/// leaves room for that plus the JSON envelope.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Serialize `value` as one JSON line and flush it.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads newline-delimited JSON values from an async reader.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream. Blank lines are skipped.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            self.buf.clear();
            let limit = MAX_FRAME_BYTES as u64 + 1;
            let n = (&mut self.inner)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;

            if n == 0 {
                return Ok(None);
            }

            if !self.buf.ends_with(b"\n") && n > MAX_FRAME_BYTES {
                return Err(BrokerError::Protocol(format!(
                    "frame exceeds {MAX_FRAME_BYTES} bytes"
                )));
            }

            let line = trim_line(&self.buf);
            if line.is_empty() {
                continue;
            }

            return Ok(Some(serde_json::from_slice(line)?));
        }
    }
}

fn trim_line(buf: &[u8]) -> &[u8] {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r' | b' ' | b'\t') {
        end -= 1;
    }
    &buf[..end]
}
