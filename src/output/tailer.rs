// src/output/tailer.rs

//! Follow a scratch file from offset 0 until its process completes.
//!
//! Each tail owns its own file handle, so any number of tails may attach to
//! the same file at any time without coordinating. End of file alone never
//! ends a tail: only an empty read that started after completion fired does.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

use crate::errors::Result;
use crate::output::ChunkSink;
use crate::registry::CompletionSignal;

#[derive(Debug, Clone)]
pub struct Tailer {
    path: PathBuf,
    completion: CompletionSignal,
    poll_interval: Duration,
    chunk_size: usize,
}

impl Tailer {
    pub fn new(
        path: impl Into<PathBuf>,
        completion: CompletionSignal,
        poll_interval: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            path: path.into(),
            completion,
            poll_interval,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Stream the whole file into `sink`, returning the number of bytes sent.
    ///
    /// Returns once the process has completed and every byte written before
    /// that has been sent. A read error or a sink error ends the tail.
    pub async fn run<S>(&self, sink: &mut S) -> Result<u64>
    where
        S: ChunkSink + ?Sized,
    {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let mut sent = 0u64;

        loop {
            // Checked before the read: if completion had already fired, the
            // writer was done and an empty read means the file is drained.
            let fired = self.completion.is_fired();

            let mut chunk = Vec::with_capacity(self.chunk_size.min(64 * 1024));
            let n = (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
                .await?;

            if n > 0 {
                trace!(path = %self.path.display(), bytes = n, "tail chunk");
                sent += n as u64;
                sink.send_chunk(chunk).await?;
                continue;
            }

            if fired {
                debug!(path = %self.path.display(), bytes = sent, "tail drained");
                return Ok(sent);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.completion.wait() => {}
            }
        }
    }
}
