#![allow(dead_code)]

use std::io::Write;

use anyhow::Result;
use tempfile::NamedTempFile;

/// Builder for broker TOML config files to simplify test setup.
#[derive(Default)]
pub struct ConfigFileBuilder {
    server: Vec<String>,
    tail: Vec<String>,
    retention: Vec<String>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_socket(mut self, path: &str) -> Self {
        self.server.push(format!("socket = {path:?}"));
        self
    }

    pub fn with_scratch_dir(mut self, path: &str) -> Self {
        self.server.push(format!("scratch_dir = {path:?}"));
        self
    }

    pub fn with_drain_timeout(mut self, value: &str) -> Self {
        self.server.push(format!("drain_timeout = {value:?}"));
        self
    }

    pub fn with_poll_interval(mut self, value: &str) -> Self {
        self.tail.push(format!("poll_interval = {value:?}"));
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.tail.push(format!("chunk_size = {bytes}"));
        self
    }

    pub fn with_completed_ttl(mut self, value: &str) -> Self {
        self.retention.push(format!("completed_ttl = {value:?}"));
        self
    }

    pub fn with_sweep_interval(mut self, value: &str) -> Self {
        self.retention.push(format!("sweep_interval = {value:?}"));
        self
    }

    pub fn keep_scratch_files(mut self) -> Self {
        self.retention.push("remove_scratch_files = false".to_string());
        self
    }

    /// Render the TOML text.
    pub fn build(&self) -> String {
        let mut out = String::new();
        for (name, lines) in [
            ("server", &self.server),
            ("tail", &self.tail),
            ("retention", &self.retention),
        ] {
            if lines.is_empty() {
                continue;
            }
            out.push_str(&format!("[{name}]\n"));
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Write the TOML to a temp file that lives as long as the handle.
    pub fn write(&self) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(self.build().as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}
