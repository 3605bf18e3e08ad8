// src/output/mod.rs

//! Output capture and tailing.
//!
//! - [`capture`] allocates the per-process scratch files and copies the
//!   child's pipes into them, mirroring every line into the log.
//! - [`tailer`] streams a scratch file to a client from offset 0, following
//!   new bytes until the process has completed and the file is drained.

pub mod capture;
pub mod tailer;

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

pub use capture::{LogMirror, ScratchFiles, allocate_scratch_files, copy_output};
pub use tailer::Tailer;

/// Destination for chunks produced by a [`Tailer`].
///
/// The server implements this on top of the client connection; tests can
/// collect chunks in memory.
pub trait ChunkSink: Send {
    fn send_chunk(&mut self, chunk: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

impl ChunkSink for Vec<Vec<u8>> {
    fn send_chunk(&mut self, chunk: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.push(chunk);
        Box::pin(async { Ok(()) })
    }
}
