// src/protocol/mod.rs

//! Wire protocol between the broker client and server.
//!
//! Every connection carries exactly one [`Request`] from the client followed
//! by one or more [`Frame`]s from the server. Both directions use
//! newline-delimited JSON (see [`codec`]).
//!
//! ```json
//! {"op":"create_process","name":"echo","args":["hello"]}
//! {"kind":"process","process":{"pid":4242,"state":"RUNNING","exit_code":0,"exit_err":""}}
//! ```
//!
//! Unary operations answer with a single `process` or `error` frame.
//! Streaming operations (`list_processes`, `stdout`, `stderr`) answer with any
//! number of data frames terminated by `end` (clean) or `error`.

pub mod codec;

use serde::{Deserialize, Serialize};

use crate::errors::{BrokerError, ErrorCode};
use crate::types::{Pid, ProcessState, StreamKind};

pub use codec::{FrameReader, MAX_FRAME_BYTES, write_frame};

/// Externally visible view of a supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcessState,
    /// Exit code once completed; `0` while running, `-1` for signal deaths.
    #[serde(default)]
    pub exit_code: i64,
    /// Human-readable exit error; empty on success and while running.
    #[serde(default)]
    pub exit_err: String,
}

impl Process {
    pub fn running(pid: Pid) -> Self {
        Self {
            pid,
            state: ProcessState::Running,
            exit_code: 0,
            exit_err: String::new(),
        }
    }
}

/// Client → server request. One per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateProcess {
        name: String,
        #[serde(default)]
        args: Vec<String>,
    },
    GetProcess {
        pid: Pid,
    },
    ListProcesses,
    SignalProcess {
        pid: Pid,
        signal: i32,
    },
    Stdout {
        pid: Pid,
    },
    Stderr {
        pid: Pid,
    },
}

impl Request {
    pub fn tail(kind: StreamKind, pid: Pid) -> Self {
        match kind {
            StreamKind::Stdout => Request::Stdout { pid },
            StreamKind::Stderr => Request::Stderr { pid },
        }
    }

    /// Short operation name for logs.
    pub fn op(&self) -> &'static str {
        match self {
            Request::CreateProcess { .. } => "create_process",
            Request::GetProcess { .. } => "get_process",
            Request::ListProcesses => "list_processes",
            Request::SignalProcess { .. } => "signal_process",
            Request::Stdout { .. } => "stdout",
            Request::Stderr { .. } => "stderr",
        }
    }
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Process {
        process: Process,
    },
    Output {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    End,
    Error {
        code: ErrorCode,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        process: Option<Process>,
    },
}

impl Frame {
    pub fn from_error(err: &BrokerError) -> Self {
        Frame::Error {
            code: err.code(),
            message: err.to_string(),
            process: err.process().cloned(),
        }
    }

    /// Convert an `error` frame back into a [`BrokerError::Remote`].
    ///
    /// Returns `None` for every other frame kind.
    pub fn into_remote_error(self) -> Option<BrokerError> {
        match self {
            Frame::Error {
                code,
                message,
                process,
            } => Some(BrokerError::Remote {
                code,
                message,
                process: process.map(Box::new),
            }),
            _ => None,
        }
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_tagged_by_op() {
        let req = Request::CreateProcess {
            name: "echo".into(),
            args: vec!["hello".into()],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"op": "create_process", "name": "echo", "args": ["hello"]})
        );

        let parsed: Request = serde_json::from_value(json!({"op": "list_processes"})).unwrap();
        assert_eq!(parsed, Request::ListProcesses);
    }

    #[test]
    fn create_without_args_defaults_to_empty() {
        let parsed: Request =
            serde_json::from_value(json!({"op": "create_process", "name": "true"})).unwrap();
        assert_eq!(
            parsed,
            Request::CreateProcess {
                name: "true".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn process_state_uses_upper_case_names() {
        let frame = Frame::Process {
            process: Process::running(7),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["kind"], "process");
        assert_eq!(value["process"]["state"], "RUNNING");
    }

    #[test]
    fn output_bytes_travel_as_base64() {
        let frame = Frame::Output {
            data: vec![0xff, 0x00, b'h', b'i'],
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"kind": "output", "data": "/wBoaQ=="}));

        let back: Frame = serde_json::from_value(value).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn error_frames_become_remote_errors() {
        let frame = Frame::from_error(&BrokerError::NotFound(99));
        let err = frame.into_remote_error().unwrap();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("99"));
        assert!(Frame::End.into_remote_error().is_none());
    }
}
