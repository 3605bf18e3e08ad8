// src/exec/exit.rs

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use crate::registry::ExitOutcome;

/// Map the result of waiting on a child to its recorded outcome.
///
/// - exit status 0: success
/// - exit status N: code N, `"exit status N"`
/// - killed by a signal: code -1, `"signal: <name>"`
/// - wait failure: code -1, `"wait: <error>"`
pub fn exit_outcome(status: std::io::Result<ExitStatus>) -> ExitOutcome {
    let status = match status {
        Ok(status) => status,
        Err(e) => return ExitOutcome::failure(-1, format!("wait: {e}")),
    };

    if status.success() {
        return ExitOutcome::success();
    }

    match (status.code(), status.signal()) {
        (Some(code), _) => ExitOutcome::failure(i64::from(code), format!("exit status {code}")),
        (None, Some(signo)) => {
            ExitOutcome::failure(-1, format!("signal: {}", signal_description(signo)))
        }
        (None, None) => ExitOutcome::failure(-1, format!("{status}")),
    }
}

/// Conventional lower-case description of a signal number.
pub fn signal_description(signo: i32) -> String {
    let name = match signo {
        1 => "hangup",
        2 => "interrupt",
        3 => "quit",
        4 => "illegal instruction",
        5 => "trace/breakpoint trap",
        6 => "aborted",
        7 => "bus error",
        8 => "floating point exception",
        9 => "killed",
        10 => "user defined signal 1",
        11 => "segmentation fault",
        12 => "user defined signal 2",
        13 => "broken pipe",
        14 => "alarm clock",
        15 => "terminated",
        other => return format!("signal {other}"),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_is_success() {
        let outcome = exit_outcome(Ok(ExitStatus::from_raw(0)));
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    fn non_zero_exit_keeps_code() {
        // Raw wait status: exit code lives in the second byte.
        let outcome = exit_outcome(Ok(ExitStatus::from_raw(3 << 8)));
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.exit_err.as_deref(), Some("exit status 3"));
    }

    #[test]
    fn signal_death_is_minus_one() {
        let outcome = exit_outcome(Ok(ExitStatus::from_raw(9)));
        assert_eq!(outcome.exit_code, -1);
        assert_eq!(outcome.exit_err.as_deref(), Some("signal: killed"));

        let outcome = exit_outcome(Ok(ExitStatus::from_raw(2)));
        assert_eq!(outcome.exit_err.as_deref(), Some("signal: interrupt"));
    }

    #[test]
    fn wait_error_is_a_failure() {
        let outcome = exit_outcome(Err(std::io::Error::other("boom")));
        assert_eq!(outcome.exit_code, -1);
        assert_eq!(outcome.exit_err.as_deref(), Some("wait: boom"));
    }

    #[test]
    fn unknown_signals_fall_back_to_the_number() {
        assert_eq!(signal_description(15), "terminated");
        assert_eq!(signal_description(40), "signal 40");
    }
}
