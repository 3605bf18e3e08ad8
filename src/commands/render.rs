// src/commands/render.rs

use std::io::Write;

use serde_json::json;

use crate::errors::BrokerError;
use crate::protocol::Process;

/// How the client prints processes and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(as_json: bool) -> Self {
        if as_json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub fn format_process(format: OutputFormat, process: &Process) -> String {
    match format {
        OutputFormat::Json => json!(process).to_string(),
        OutputFormat::Text => {
            let mut line = format!(
                "Process: pid={} state={} exit_code={}",
                process.pid, process.state, process.exit_code
            );
            if !process.exit_err.is_empty() {
                line.push_str(&format!(" exit_err={:?}", process.exit_err));
            }
            line
        }
    }
}

pub fn format_error(format: OutputFormat, err: &BrokerError) -> String {
    match format {
        OutputFormat::Json => {
            let mut value = json!({
                "error": err.to_string(),
                "code": err.code(),
            });
            if let Some(process) = err.process() {
                value["process"] = json!(process);
            }
            value.to_string()
        }
        OutputFormat::Text => format!("procbroker: {err}"),
    }
}

pub fn print_process<W: Write>(out: &mut W, format: OutputFormat, process: &Process) -> std::io::Result<()> {
    writeln!(out, "{}", format_process(format, process))
}

pub fn print_error(format: OutputFormat, err: &BrokerError) {
    eprintln!("{}", format_error(format, err));
}
