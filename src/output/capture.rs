// src/output/capture.rs

use std::fs::File;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::errors::{BrokerError, Result};
use crate::types::{Pid, StreamKind};

const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// Longest partial line the log mirror holds back before emitting it anyway.
const MAX_PENDING_LINE_BYTES: usize = 64 * 1024;

/// The two freshly created capture files for one process.
#[derive(Debug)]
pub struct ScratchFiles {
    pub stdout: File,
    pub stdout_path: PathBuf,
    pub stderr: File,
    pub stderr_path: PathBuf,
}

impl ScratchFiles {
    /// Delete both files. Used when the process fails to start.
    pub fn discard(self) {
        for path in [&self.stdout_path, &self.stderr_path] {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to remove scratch file");
            }
        }
    }
}

/// Create a stdout/stderr scratch file pair in `dir`.
///
/// Names are unique per call, so concurrent creations never collide. If the
/// second file cannot be created, the first one is removed again.
pub fn allocate_scratch_files(dir: &Path) -> Result<ScratchFiles> {
    std::fs::create_dir_all(dir).map_err(|source| BrokerError::ScratchFile {
        dir: dir.to_path_buf(),
        source,
    })?;

    let (stdout, stdout_path) = create_scratch_file(dir, StreamKind::Stdout)?;
    let (stderr, stderr_path) = match create_scratch_file(dir, StreamKind::Stderr) {
        Ok(pair) => pair,
        Err(e) => {
            let _ = std::fs::remove_file(&stdout_path);
            return Err(e);
        }
    };

    Ok(ScratchFiles {
        stdout,
        stdout_path,
        stderr,
        stderr_path,
    })
}

fn create_scratch_file(dir: &Path, kind: StreamKind) -> Result<(File, PathBuf)> {
    let suffix = format!(".{}", kind.as_str());
    tempfile::Builder::new()
        .prefix("procbroker.")
        .suffix(&suffix)
        .tempfile_in(dir)
        .and_then(|tmp| tmp.keep().map_err(|e| e.error))
        .map_err(|source| BrokerError::ScratchFile {
            dir: dir.to_path_buf(),
            source,
        })
}

/// Mirrors a byte stream into the log, one event per complete line.
#[derive(Debug)]
pub struct LogMirror {
    pid: Pid,
    kind: StreamKind,
    path: PathBuf,
    pending: Vec<u8>,
}

impl LogMirror {
    pub fn new(pid: Pid, kind: StreamKind, path: PathBuf) -> Self {
        Self {
            pid,
            kind,
            path,
            pending: Vec::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        for line in self.split_lines(chunk) {
            self.emit(&line);
        }
    }

    /// Emit whatever partial line is still buffered.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit(&rest);
        }
    }

    /// Split `chunk` into complete lines (without the trailing newline),
    /// keeping any unterminated tail for the next call.
    fn split_lines(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                lines.push(std::mem::take(&mut self.pending));
                continue;
            }
            self.pending.push(byte);
            if self.pending.len() >= MAX_PENDING_LINE_BYTES {
                lines.push(std::mem::take(&mut self.pending));
            }
        }
        lines
    }

    fn emit(&self, line: &[u8]) {
        info!(
            pid = self.pid,
            stream = %self.kind,
            path = %self.path.display(),
            "{}",
            String::from_utf8_lossy(line)
        );
    }
}

/// Copy a child pipe into its scratch file until the pipe closes.
///
/// Every chunk is flushed to the file before the next read, so tailers see
/// output as soon as the child produces it. Returns the number of bytes
/// copied.
pub async fn copy_output<R>(
    mut source: R,
    file: File,
    mut mirror: LogMirror,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::from_std(file);
    let mut buf = vec![0u8; COPY_BUFFER_BYTES];
    let mut total = 0u64;

    let result = loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break Ok(total),
            Ok(n) => n,
            Err(e) => break Err(e),
        };

        if let Err(e) = file.write_all(&buf[..n]).await {
            break Err(e);
        }
        if let Err(e) = file.flush().await {
            break Err(e);
        }
        mirror.feed(&buf[..n]);
        total += n as u64;
    };

    mirror.finish();
    file.flush().await?;
    debug!(
        pid = mirror.pid,
        stream = %mirror.kind,
        bytes = total,
        "output capture closed"
    );
    result
}
