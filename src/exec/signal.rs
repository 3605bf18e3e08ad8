// src/exec/signal.rs

//! Signal delivery to supervised processes.
//!
//! A failed delivery is recorded on the record as its `fault` and returned to
//! the caller together with the process state. It never changes the state:
//! only the completion watcher does that.
//!
//! Signalling a process that has already exited is not a failure. Either
//! completion has fired before the attempt (nothing is sent), or the kernel
//! reports `ESRCH` while the watcher is still finishing up, in which case we
//! give completion a short grace period before deciding.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid as OsPid;
use tracing::{debug, info, warn};

use crate::errors::{BrokerError, Result};
use crate::protocol::Process;
use crate::registry::ProcessRecord;

const EXIT_RACE_GRACE: Duration = Duration::from_millis(250);

/// Send `signo` to the process behind `record`.
///
/// Signal number 0 only checks that the process exists.
pub async fn deliver_signal(record: &ProcessRecord, signo: i32) -> Result<Process> {
    let pid = record.pid();

    if record.completion().is_fired() {
        debug!(pid, signal = signo, "process already exited; signal not sent");
        return Ok(record.to_process());
    }

    let signal = match signo {
        0 => None,
        n => match Signal::try_from(n) {
            Ok(signal) => Some(signal),
            Err(errno) => return Err(record_fault(record, signo, errno.desc())),
        },
    };

    let Ok(raw_pid) = i32::try_from(pid) else {
        return Err(record_fault(record, signo, "pid out of range"));
    };

    match kill(OsPid::from_raw(raw_pid), signal) {
        Ok(()) => {
            info!(pid, signal = signo, "signal delivered");
            Ok(record.to_process())
        }
        Err(Errno::ESRCH) if exited_meanwhile(record).await => {
            debug!(pid, signal = signo, "process exited before the signal arrived");
            Ok(record.to_process())
        }
        Err(errno) => Err(record_fault(record, signo, errno.desc())),
    }
}

async fn exited_meanwhile(record: &ProcessRecord) -> bool {
    tokio::time::timeout(EXIT_RACE_GRACE, record.completion().wait())
        .await
        .is_ok()
}

fn record_fault(record: &ProcessRecord, signo: i32, reason: &str) -> BrokerError {
    let pid = record.pid();
    warn!(pid, signal = signo, reason, "signal delivery failed");
    record.set_fault(format!("signal {signo}: {reason}"));
    BrokerError::Signal {
        pid,
        signal: signo,
        reason: reason.to_string(),
        process: Box::new(record.to_process()),
    }
}
