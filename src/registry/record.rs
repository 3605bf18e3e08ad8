// src/registry/record.rs

//! In-memory state for one spawned process.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::protocol::Process;
use crate::types::{Pid, ProcessState, StreamKind};

/// How a process finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    /// OS exit code, or `-1` when the process died from a signal or could
    /// not be waited on.
    pub exit_code: i64,
    /// `None` for a clean exit (status 0).
    pub exit_err: Option<String>,
    pub finished_at: Instant,
}

impl ExitOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            exit_err: None,
            finished_at: Instant::now(),
        }
    }

    pub fn failure(exit_code: i64, exit_err: impl Into<String>) -> Self {
        Self {
            exit_code,
            exit_err: Some(exit_err.into()),
            finished_at: Instant::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_err.is_none()
    }
}

/// Create a connected completion pair: one writer, any number of observers.
pub fn completion_channel() -> (Completer, CompletionSignal) {
    let (tx, rx) = watch::channel(None);
    (Completer { tx }, CompletionSignal { rx })
}

/// Write side of the completion signal. Owned by the completion watcher.
#[derive(Debug)]
pub struct Completer {
    tx: watch::Sender<Option<ExitOutcome>>,
}

impl Completer {
    /// Record the outcome and wake every observer.
    ///
    /// Only the first call has an effect; returns whether this call fired.
    pub fn fire(&self, outcome: ExitOutcome) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

/// One-shot, multi-observer completion signal.
///
/// Observers may check or wait before and after it fires; once fired it
/// stays fired and the outcome never changes.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    rx: watch::Receiver<Option<ExitOutcome>>,
}

impl CompletionSignal {
    pub fn is_fired(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn outcome(&self) -> Option<ExitOutcome> {
        self.rx.borrow().clone()
    }

    /// Wait until the signal fires and return the outcome.
    ///
    /// If the completer goes away without firing (the broker detached from
    /// the process), this never resolves.
    pub async fn wait(&self) -> ExitOutcome {
        let mut rx = self.rx.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }
}

/// Registry entry for one spawned process.
#[derive(Debug)]
pub struct ProcessRecord {
    pid: Pid,
    command: String,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    completion: CompletionSignal,
    exec_scope: CancellationToken,
    fault: Mutex<Option<String>>,
}

impl ProcessRecord {
    pub fn new(
        pid: Pid,
        command: String,
        stdout_path: PathBuf,
        stderr_path: PathBuf,
        completion: CompletionSignal,
        exec_scope: CancellationToken,
    ) -> Self {
        Self {
            pid,
            command,
            stdout_path,
            stderr_path,
            completion,
            exec_scope,
            fault: Mutex::new(None),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The command line the process was started with, for logs.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn stdout_path(&self) -> &Path {
        &self.stdout_path
    }

    pub fn stderr_path(&self) -> &Path {
        &self.stderr_path
    }

    pub fn output_path(&self, kind: StreamKind) -> &Path {
        match kind {
            StreamKind::Stdout => &self.stdout_path,
            StreamKind::Stderr => &self.stderr_path,
        }
    }

    pub fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    /// Execution scope of the process. Cancelled when the process completes
    /// or when the broker stops supervising it.
    pub fn exec_scope(&self) -> &CancellationToken {
        &self.exec_scope
    }

    /// Derived state: `Running` until completion fires, then terminal.
    pub fn state(&self) -> ProcessState {
        match self.completion.outcome() {
            None => ProcessState::Running,
            Some(outcome) if outcome.is_success() => ProcessState::Succeeded,
            Some(_) => ProcessState::Failed,
        }
    }

    /// Wire view of this record, computed from a single read of the
    /// completion slot.
    pub fn to_process(&self) -> Process {
        match self.completion.outcome() {
            None => Process::running(self.pid),
            Some(outcome) => {
                let state = if outcome.is_success() {
                    ProcessState::Succeeded
                } else {
                    ProcessState::Failed
                };
                Process {
                    pid: self.pid,
                    state,
                    exit_code: outcome.exit_code,
                    exit_err: outcome.exit_err.unwrap_or_default(),
                }
            }
        }
    }

    /// Last signal-delivery error, if any. Diagnostic only.
    pub fn fault(&self) -> Option<String> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_fault(&self, fault: impl Into<String>) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(fault.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(signal: CompletionSignal) -> ProcessRecord {
        ProcessRecord::new(
            10,
            "sleep 1".into(),
            PathBuf::from("/tmp/a.stdout"),
            PathBuf::from("/tmp/a.stderr"),
            signal,
            CancellationToken::new(),
        )
    }

    #[test]
    fn state_is_derived_from_completion() {
        let (completer, signal) = completion_channel();
        let rec = record(signal);
        assert_eq!(rec.state(), ProcessState::Running);
        assert_eq!(rec.to_process(), Process::running(10));

        assert!(completer.fire(ExitOutcome::failure(3, "exit status 3")));
        assert_eq!(rec.state(), ProcessState::Failed);
        let p = rec.to_process();
        assert_eq!(p.exit_code, 3);
        assert_eq!(p.exit_err, "exit status 3");
    }

    #[test]
    fn completion_fires_only_once() {
        let (completer, signal) = completion_channel();
        assert!(completer.fire(ExitOutcome::success()));
        assert!(!completer.fire(ExitOutcome::failure(1, "exit status 1")));
        assert!(signal.outcome().unwrap().is_success());
    }

    #[test]
    fn fault_does_not_change_state() {
        let (_completer, signal) = completion_channel();
        let rec = record(signal);
        rec.set_fault("ESRCH: No such process");
        assert_eq!(rec.fault().as_deref(), Some("ESRCH: No such process"));
        assert_eq!(rec.state(), ProcessState::Running);
    }

    #[tokio::test]
    async fn many_observers_see_the_same_outcome() {
        let (completer, signal) = completion_channel();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let s = signal.clone();
                tokio::spawn(async move { s.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        completer.fire(ExitOutcome::failure(-1, "signal: killed"));

        for w in waiters {
            let outcome = w.await.unwrap();
            assert_eq!(outcome.exit_err.as_deref(), Some("signal: killed"));
        }

        // Late observers resolve immediately.
        assert_eq!(signal.wait().await.exit_code, -1);
    }

    #[tokio::test]
    async fn dropped_completer_never_resolves() {
        let (completer, signal) = completion_channel();
        drop(completer);
        let res = tokio::time::timeout(Duration::from_millis(20), signal.wait()).await;
        assert!(res.is_err());
    }
}
