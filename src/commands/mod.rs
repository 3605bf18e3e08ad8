// src/commands/mod.rs

//! Command handlers behind the CLI.
//!
//! Each handler returns the process exit code to use. Process output only
//! ever goes to stdout; metadata and errors go wherever [`render`] sends
//! them, never mixed into a data stream.

pub mod client;
pub mod render;
pub mod server;
pub mod signal_proxy;

use anyhow::Result;

use crate::cli::{CliArgs, Command};

pub async fn dispatch(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Server(server_args) => server::run_server(server_args).await,
        Command::Client(client_args) => client::run_client(client_args).await,
    }
}
