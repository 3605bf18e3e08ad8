// src/commands/client.rs

use anyhow::Result;
use tokio::io::AsyncWriteExt;

use crate::cli::{ClientArgs, ClientCommand};
use crate::client::BrokerClient;
use crate::commands::render::{OutputFormat, print_error, print_process};
use crate::commands::signal_proxy::SignalProxy;
use crate::errors::BrokerError;
use crate::protocol::Process;
use crate::types::Pid;

/// Run one client subcommand.
///
/// Broker errors are printed to stderr, not returned. The exit status is then
/// [`exit_status`](crate::errors::ErrorCode::exit_status) of the error code,
/// which keeps them apart from a child's own exit code.
pub async fn run_client(args: ClientArgs) -> Result<i32> {
    let format = OutputFormat::from_flag(args.as_json);
    let client = BrokerClient::new(&args.socket);

    let outcome = match args.command {
        ClientCommand::Create(command) => client
            .create_process(&command.name, &command.args)
            .await
            .map(|process| report(&process, format, args.quiet)),
        ClientCommand::Get { pid } => client
            .get_process(pid)
            .await
            .map(|process| report(&process, format, false)),
        ClientCommand::List => client.list_processes().await.map(|processes| {
            for process in &processes {
                report(process, format, false);
            }
            0
        }),
        ClientCommand::Signal { pid, signal } => client
            .signal_process(pid, signal)
            .await
            .map(|process| report(&process, format, args.quiet)),
        ClientCommand::Output { signal_proxy, pid } => output(&client, pid, signal_proxy).await,
        ClientCommand::Execute {
            signal_proxy,
            command,
        } => execute(&client, &command.name, &command.args, signal_proxy, format, args.quiet).await,
    };

    match outcome {
        Ok(code) => Ok(code),
        Err(e) => {
            print_error(format, &e);
            Ok(e.code().exit_status())
        }
    }
}

fn report(process: &Process, format: OutputFormat, quiet: bool) -> i32 {
    if !quiet {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = print_process(&mut stdout, format, process) {
            tracing::warn!(error = %e, "failed to write to stdout");
            return 1;
        }
    }
    0
}

async fn output(client: &BrokerClient, pid: Pid, signal_proxy: bool) -> Result<i32, BrokerError> {
    let _proxy = if signal_proxy {
        Some(SignalProxy::spawn(client.clone(), pid)?)
    } else {
        None
    };

    let mut out = tokio::io::stdout();
    let mut err = tokio::io::stderr();
    client.follow_output(pid, &mut out, &mut err).await?;
    out.flush().await?;
    err.flush().await?;
    Ok(0)
}

/// Create, stream both outputs to this terminal, and mirror the exit code.
///
/// Process metadata goes to stderr so stdout carries only process output.
async fn execute(
    client: &BrokerClient,
    name: &str,
    args: &[String],
    signal_proxy: bool,
    format: OutputFormat,
    quiet: bool,
) -> Result<i32, BrokerError> {
    let mut out = tokio::io::stdout();
    let mut err = tokio::io::stderr();
    let mut proxy = None;
    let mut proxy_error = None;

    let execution = client
        .execute(name, args, &mut out, &mut err, |started| {
            if !quiet {
                let mut stderr = std::io::stderr().lock();
                if let Err(e) = print_process(&mut stderr, format, started) {
                    tracing::warn!(error = %e, "failed to write to stderr");
                }
            }
            if signal_proxy {
                match SignalProxy::spawn(client.clone(), started.pid) {
                    Ok(p) => proxy = Some(p),
                    Err(e) => proxy_error = Some(e),
                }
            }
        })
        .await?;
    drop(proxy);
    if let Some(e) = proxy_error {
        tracing::warn!(error = %e, "signal proxy was not installed");
    }

    out.flush().await?;
    err.flush().await?;
    Ok(execution.exit_code())
}
