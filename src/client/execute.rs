// src/client/execute.rs

use tokio::io::AsyncWrite;

use crate::client::BrokerClient;
use crate::errors::Result;
use crate::protocol::Process;

/// Result of [`BrokerClient::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// State returned when the process was created.
    pub started: Process,
    /// State read after both output streams ended.
    pub finished: Process,
}

impl Execution {
    /// Exit code to hand to the shell for this process.
    pub fn exit_code(&self) -> i32 {
        match i32::try_from(self.finished.exit_code) {
            Ok(code) if code > 0 => code,
            _ if self.finished.state.is_terminal() && !self.finished.exit_err.is_empty() => 1,
            _ => 0,
        }
    }
}

impl BrokerClient {
    /// Create a process and block until its complete output has been copied
    /// to `out` and `err`.
    ///
    /// `on_start` runs once the process exists, before any output is read.
    pub async fn execute<O, E, F>(
        &self,
        name: &str,
        args: &[String],
        out: &mut O,
        err: &mut E,
        on_start: F,
    ) -> Result<Execution>
    where
        O: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
        F: FnOnce(&Process),
    {
        let started = self.create_process(name, args).await?;
        on_start(&started);
        self.follow_output(started.pid, out, err).await?;
        let finished = self.get_process(started.pid).await?;
        Ok(Execution { started, finished })
    }
}
