// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_SOCKET_PATH;
use crate::types::Pid;

/// Command-line arguments for `procbroker`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procbroker",
    version,
    about = "Start, watch, signal and tail processes through a local broker.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCBROKER_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the broker in the foreground.
    Server(ServerArgs),

    /// Talk to a running broker.
    Client(ClientArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Socket to listen on. Overrides the config file.
    #[arg(short = 'a', long = "address", value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for captured output. Overrides the config file.
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// Socket of the broker to talk to.
    #[arg(
        short = 'a',
        long = "address",
        value_name = "PATH",
        default_value = DEFAULT_SOCKET_PATH
    )]
    pub socket: PathBuf,

    /// Print processes and errors as JSON, one object per line.
    #[arg(short = 'j', long)]
    pub as_json: bool,

    /// Do not print process metadata.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: ClientCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ClientCommand {
    /// Start a process and print it.
    Create(CommandLine),

    /// Start a process, stream its output and exit with its exit code.
    Execute {
        /// Forward SIGINT and SIGTERM received by this client to the process.
        #[arg(short = 'p', long)]
        signal_proxy: bool,

        #[command(flatten)]
        command: CommandLine,
    },

    /// Print one process.
    Get { pid: Pid },

    /// Print every process known to the broker.
    List,

    /// Send a signal (by number) to a process.
    Signal {
        pid: Pid,
        #[arg(allow_negative_numbers = true)]
        signal: i32,
    },

    /// Stream a process's stdout and stderr to this terminal until it exits.
    Output {
        /// Forward SIGINT and SIGTERM received by this client to the process.
        #[arg(short = 'p', long)]
        signal_proxy: bool,

        pid: Pid,
    },
}

/// Executable and its arguments. No shell is involved.
#[derive(Debug, Clone, Args)]
pub struct CommandLine {
    /// Executable to run.
    pub name: String,

    /// Arguments passed verbatim.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn execute_keeps_hyphenated_args_for_the_child() {
        let args = CliArgs::try_parse_from([
            "procbroker", "client", "-j", "execute", "-p", "ls", "-l", "--all",
        ])
        .unwrap();

        let Command::Client(client) = args.command else {
            panic!("expected client command");
        };
        assert!(client.as_json);
        assert_eq!(client.socket, PathBuf::from(DEFAULT_SOCKET_PATH));
        match client.command {
            ClientCommand::Execute {
                signal_proxy,
                command,
            } => {
                assert!(signal_proxy);
                assert_eq!(command.name, "ls");
                assert_eq!(command.args, vec!["-l", "--all"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn server_overrides_are_optional() {
        let args = CliArgs::try_parse_from(["procbroker", "--log-level", "debug", "server"]).unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        let Command::Server(server) = args.command else {
            panic!("expected server command");
        };
        assert!(server.socket.is_none());
        assert!(server.config.is_none());
    }
}
