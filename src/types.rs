// src/types.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// OS process identifier as handed out by the broker.
pub type Pid = u32;

/// Derived lifecycle state of a supervised process.
///
/// - `Running`: the completion signal has not fired yet.
/// - `Succeeded`: the process exited with status 0.
/// - `Failed`: the process exited non-zero, was killed by a signal, or could
///   not be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Running,
    Succeeded,
    Failed,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Running => "RUNNING",
            ProcessState::Succeeded => "SUCCEEDED",
            ProcessState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ProcessState::Running)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the broker server itself.
///
/// Transitions only move forward: `Idle -> Listening -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Idle,
    Listening,
    Draining,
    Stopped,
}

/// Which captured stream of a process a tail request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
