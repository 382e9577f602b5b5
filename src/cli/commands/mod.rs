//! CLI command implementations

mod info;
mod inspect;
mod validate;


use crate::cli::{init_tracing, LogLevel};
use crate::config::{Cli, Command, OutputFormat};
use serde::Serialize;

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.quiet, cli.verbose);
    init_tracing(log_level);

    match cli.command {
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Info(args) => info::run_info(args, log_level),
        Command::Inspect(args) => inspect::run_inspect(args, log_level),
    }
}

/// Render a report as JSON or YAML; `None` for text output
fn render_structured<T: Serialize>(
    report: &T,
    format: OutputFormat,
) -> Result<Option<String>, String> {
    match format {
        OutputFormat::Text => Ok(None),
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map(Some)
            .map_err(|e| format!("JSON serialization error: {e}")),
        OutputFormat::Yaml => serde_yaml::to_string(report)
            .map(Some)
            .map_err(|e| format!("YAML serialization error: {e}")),
    }
}
