// src/errors.rs

//! Crate-wide error type and the wire error codes it maps to.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Process;
use crate::types::Pid;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("process not found: {0}")]
    NotFound(Pid),

    #[error("creating scratch file in {dir:?}: {source}")]
    ScratchFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("starting process '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("delivering signal {signal} to process {pid}: {reason}")]
    Signal {
        pid: Pid,
        signal: i32,
        reason: String,
        /// Derived state of the process at the time of the failed delivery.
        process: Box<Process>,
    },

    #[error("connecting to broker at {path:?}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error reported by the broker on the other end of the socket.
    #[error("{code}: {message}")]
    Remote {
        code: ErrorCode,
        message: String,
        process: Option<Box<Process>>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Machine-readable error category sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    SpawnFailed,
    SignalFailed,
    Io,
    InvalidRequest,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::SpawnFailed => "SPAWN_FAILED",
            ErrorCode::SignalFailed => "SIGNAL_FAILED",
            ErrorCode::Io => "IO",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Client exit statuses for broker errors start above this value.
pub const ERROR_EXIT_OFFSET: i32 = 15;

impl ErrorCode {
    /// Exit status the CLI uses when a request fails with this code.
    ///
    /// `ERROR_EXIT_OFFSET` plus the number of the closest gRPC status, so a
    /// failed request never exits with the same status as another code.
    pub fn exit_status(self) -> i32 {
        let grpc = match self {
            ErrorCode::InvalidRequest => 3,
            ErrorCode::NotFound => 5,
            ErrorCode::SpawnFailed => 9,
            ErrorCode::SignalFailed => 10,
            ErrorCode::Internal => 13,
            ErrorCode::Io => 14,
        };
        ERROR_EXIT_OFFSET + grpc
    }
}

impl BrokerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BrokerError::NotFound(_) => ErrorCode::NotFound,
            BrokerError::ScratchFile { .. } | BrokerError::Spawn { .. } => ErrorCode::SpawnFailed,
            BrokerError::Signal { .. } => ErrorCode::SignalFailed,
            BrokerError::Io(_) | BrokerError::Connect { .. } => ErrorCode::Io,
            BrokerError::Json(_) | BrokerError::Protocol(_) => ErrorCode::InvalidRequest,
            BrokerError::Remote { code, .. } => *code,
            BrokerError::Config(_) | BrokerError::Toml(_) | BrokerError::Other(_) => {
                ErrorCode::Internal
            }
        }
    }

    /// Process state attached to the error, if any.
    pub fn process(&self) -> Option<&Process> {
        match self {
            BrokerError::Signal { process, .. } => Some(process.as_ref()),
            BrokerError::Remote { process, .. } => process.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_their_code() {
        let err = BrokerError::Remote {
            code: ErrorCode::NotFound,
            message: "process not found: 42".to_string(),
            process: None,
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "NOT_FOUND: process not found: 42");
    }

    #[test]
    fn local_errors_map_to_wire_codes() {
        assert_eq!(BrokerError::NotFound(1).code(), ErrorCode::NotFound);
        assert_eq!(
            BrokerError::Protocol("bad frame".into()).code(),
            ErrorCode::InvalidRequest
        );
        let spawn = BrokerError::Spawn {
            name: "nope".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(spawn.code(), ErrorCode::SpawnFailed);
    }

    #[test]
    fn every_code_has_its_own_exit_status() {
        let codes = [
            ErrorCode::NotFound,
            ErrorCode::SpawnFailed,
            ErrorCode::SignalFailed,
            ErrorCode::Io,
            ErrorCode::InvalidRequest,
            ErrorCode::Internal,
        ];
        let mut statuses: Vec<i32> = codes.iter().map(|c| c.exit_status()).collect();
        assert!(statuses.iter().all(|s| *s > ERROR_EXIT_OFFSET && *s < 126));
        statuses.sort_unstable();
        statuses.dedup();
        assert_eq!(statuses.len(), codes.len());
        assert_eq!(ErrorCode::NotFound.exit_status(), 20);
    }
}
