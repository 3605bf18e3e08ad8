// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{BrokerConfig, MAX_CHUNK_SIZE, RawConfigFile, RetentionPolicy};
use crate::errors::{BrokerError, Result};

impl TryFrom<RawConfigFile> for BrokerConfig {
    type Error = BrokerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_server(&raw)?;
        validate_tail(&raw)?;

        let scratch_dir = raw
            .server
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        Ok(BrokerConfig {
            socket_path: raw.server.socket.clone(),
            scratch_dir,
            drain_timeout: optional_duration("[server].drain_timeout", &raw.server.drain_timeout)?,
            poll_interval: non_zero_duration("[tail].poll_interval", &raw.tail.poll_interval)?,
            chunk_size: raw.tail.chunk_size,
            retention: RetentionPolicy {
                completed_ttl: optional_duration(
                    "[retention].completed_ttl",
                    &raw.retention.completed_ttl,
                )?,
                sweep_interval: non_zero_duration(
                    "[retention].sweep_interval",
                    &raw.retention.sweep_interval,
                )?,
                remove_scratch_files: raw.retention.remove_scratch_files,
            },
        })
    }
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.socket.as_os_str().is_empty() {
        return Err(BrokerError::Config(
            "[server].socket must not be empty".to_string(),
        ));
    }

    if let Some(dir) = &cfg.server.scratch_dir {
        if dir.exists() && !dir.is_dir() {
            return Err(BrokerError::Config(format!(
                "[server].scratch_dir {:?} exists but is not a directory",
                dir
            )));
        }
    }

    Ok(())
}

fn validate_tail(cfg: &RawConfigFile) -> Result<()> {
    let size = cfg.tail.chunk_size;
    if size == 0 || size > MAX_CHUNK_SIZE {
        return Err(BrokerError::Config(format!(
            "[tail].chunk_size must be between 1 and {MAX_CHUNK_SIZE} (got {size})"
        )));
    }
    Ok(())
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| BrokerError::Config(format!("{field}: {e}")))
}

fn non_zero_duration(field: &str, value: &str) -> Result<Duration> {
    let dur = duration_field(field, value)?;
    if dur.is_zero() {
        return Err(BrokerError::Config(format!("{field} must be greater than zero")));
    }
    Ok(dur)
}

fn optional_duration(field: &str, value: &Option<String>) -> Result<Option<Duration>> {
    value.as_deref().map(|v| duration_field(field, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(raw: RawConfigFile) -> String {
        match BrokerConfig::try_from(raw) {
            Err(BrokerError::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.tail.poll_interval = "0ms".to_string();
        assert!(config_error(raw).contains("poll_interval"));
    }

    #[test]
    fn oversized_chunks_are_rejected() {
        let mut raw = RawConfigFile::default();
        raw.tail.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(config_error(raw).contains("chunk_size"));

        let mut raw = RawConfigFile::default();
        raw.tail.chunk_size = 0;
        assert!(config_error(raw).contains("chunk_size"));
    }

    #[test]
    fn bad_retention_duration_names_the_field() {
        let mut raw = RawConfigFile::default();
        raw.retention.completed_ttl = Some("soon".to_string());
        assert!(config_error(raw).contains("[retention].completed_ttl"));
    }

    #[test]
    fn scratch_dir_must_be_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut raw = RawConfigFile::default();
        raw.server.scratch_dir = Some(file.path().to_path_buf());
        assert!(config_error(raw).contains("scratch_dir"));
    }

    #[test]
    fn empty_socket_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.server.socket = std::path::PathBuf::new();
        assert!(config_error(raw).contains("socket"));
    }
}
