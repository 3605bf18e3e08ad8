// src/lib.rs

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod types;

use anyhow::Result;

use crate::cli::CliArgs;

/// High-level entry point used by `main.rs`.
///
/// Returns the exit code the process should terminate with.
pub async fn run(args: CliArgs) -> Result<i32> {
    commands::dispatch(args).await
}
