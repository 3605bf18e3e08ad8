// src/exec/spawn.rs

//! Start a supervised child process.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{BrokerError, Result};
use crate::exec::exit_outcome;
use crate::output::{LogMirror, ScratchFiles, allocate_scratch_files, copy_output};
use crate::registry::{Completer, ProcessRecord, completion_channel};
use crate::types::{Pid, StreamKind};

/// Spawn `name` with `args` and start its completion watcher.
///
/// The child runs under a child token of `root_scope`, never under the
/// caller's request, so dropping the request does not touch the process.
/// The child gets its own process group and is not killed when its handle is
/// dropped. On any failure the scratch files are removed again and no record
/// is returned.
pub fn spawn_process(
    name: &str,
    args: &[String],
    scratch_dir: &Path,
    root_scope: &CancellationToken,
) -> Result<Arc<ProcessRecord>> {
    let files = allocate_scratch_files(scratch_dir)?;
    let command_line = render_command(name, args);

    let mut cmd = Command::new(name);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false)
        .process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            files.discard();
            return Err(BrokerError::Spawn {
                name: name.to_string(),
                source,
            });
        }
    };

    let Some(pid) = child.id() else {
        files.discard();
        return Err(BrokerError::Spawn {
            name: name.to_string(),
            source: std::io::Error::other("process exited before its pid could be read"),
        });
    };

    let ScratchFiles {
        stdout,
        stdout_path,
        stderr,
        stderr_path,
    } = files;

    let copiers = [
        start_copier(&mut child, pid, StreamKind::Stdout, stdout, &stdout_path),
        start_copier(&mut child, pid, StreamKind::Stderr, stderr, &stderr_path),
    ];

    let (completer, completion) = completion_channel();
    let exec_scope = root_scope.child_token();
    let record = Arc::new(ProcessRecord::new(
        pid,
        command_line,
        stdout_path,
        stderr_path,
        completion,
        exec_scope.clone(),
    ));

    info!(
        pid,
        cmd = %record.command(),
        stdout = %record.stdout_path().display(),
        stderr = %record.stderr_path().display(),
        "process started"
    );

    tokio::spawn(watch_process(child, pid, copiers, completer, exec_scope));

    Ok(record)
}

fn start_copier(
    child: &mut Child,
    pid: Pid,
    kind: StreamKind,
    file: std::fs::File,
    path: &Path,
) -> Option<JoinHandle<()>> {
    let mirror = LogMirror::new(pid, kind, path.to_path_buf());
    match kind {
        StreamKind::Stdout => child
            .stdout
            .take()
            .map(|pipe| spawn_copy(pipe, pid, kind, file, mirror, path)),
        StreamKind::Stderr => child
            .stderr
            .take()
            .map(|pipe| spawn_copy(pipe, pid, kind, file, mirror, path)),
    }
}

fn spawn_copy<R>(
    pipe: R,
    pid: Pid,
    kind: StreamKind,
    file: std::fs::File,
    mirror: LogMirror,
    path: &Path,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let path = path.to_path_buf();
    tokio::spawn(async move {
        if let Err(e) = copy_output(pipe, file, mirror).await {
            warn!(
                pid,
                stream = %kind,
                path = %path.display(),
                error = %e,
                "output capture failed"
            );
        }
    })
}

/// The one completion watcher for a process.
///
/// Waits for exit, lets both copiers drain the pipes into the scratch files,
/// then fires completion. If the scope is cancelled first the broker is
/// going away: the watcher detaches and leaves the child running.
async fn watch_process(
    mut child: Child,
    pid: Pid,
    copiers: [Option<JoinHandle<()>>; 2],
    completer: Completer,
    scope: CancellationToken,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = scope.cancelled() => {
            debug!(pid, "broker stopping; detaching from running process");
            return;
        }
    };

    for copier in copiers.into_iter().flatten() {
        if let Err(e) = copier.await {
            warn!(pid, error = %e, "output copier task failed");
        }
    }

    let outcome = exit_outcome(status);
    info!(
        pid,
        exit_code = outcome.exit_code,
        exit_err = outcome.exit_err.as_deref().unwrap_or(""),
        "process exited"
    );
    completer.fire(outcome);
    scope.cancel();
}

fn render_command(name: &str, args: &[String]) -> String {
    std::iter::once(name)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::types::ProcessState;

    #[tokio::test]
    async fn echo_output_lands_in_the_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = CancellationToken::new();
        let record = spawn_process("echo", &["hello".into()], dir.path(), &root).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), record.completion().wait())
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(record.state(), ProcessState::Succeeded);
        assert!(record.exec_scope().is_cancelled());
        assert_eq!(std::fs::read(record.stdout_path()).unwrap(), b"hello\n");
        assert_eq!(std::fs::read(record.stderr_path()).unwrap(), b"");
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let root = CancellationToken::new();
        let err = spawn_process("/definitely/not/a/binary", &[], dir.path(), &root).unwrap_err();

        assert!(matches!(err, BrokerError::Spawn { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cancelling_the_root_scope_detaches_without_killing() {
        let dir = tempfile::tempdir().unwrap();
        let root = CancellationToken::new();
        let record = spawn_process("sleep", &["5".into()], dir.path(), &root).unwrap();

        root.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pid = nix::unistd::Pid::from_raw(record.pid() as i32);
        assert!(nix::sys::signal::kill(pid, None).is_ok());
        assert_eq!(record.state(), ProcessState::Running);

        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
    }

    #[test]
    fn command_line_joins_name_and_args() {
        assert_eq!(render_command("ls", &["-l".into(), "/tmp".into()]), "ls -l /tmp");
        assert_eq!(render_command("true", &[]), "true");
    }
}
