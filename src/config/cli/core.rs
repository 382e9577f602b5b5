//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::types::OutputFormat;
use crate::config::LeoConfig;

/// leoseg: few-shot segmentation with latent embedding optimization
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "leoseg")]
#[command(author = "PAIML")]
#[command(version)]
#[command(about = "Few-shot segmentation meta-training: configuration and checkpoint tooling")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Summarize a configuration and the experiment it points at
    Info(InfoArgs),

    /// Load a checkpoint and print its training statistics
    Inspect(InspectArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML or JSON configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show the parsed configuration
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML or JSON configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the experiment number
    #[arg(long)]
    pub experiment: Option<u32>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the inspect command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Path to YAML or JSON configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the experiment number
    #[arg(long)]
    pub experiment: Option<u32>,

    /// Checkpoint episode, -1 for the latest
    #[arg(short, long, allow_hyphen_values = true)]
    pub episode: Option<i64>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a configuration
pub fn apply_overrides(config: &mut LeoConfig, experiment: Option<u32>, episode: Option<i64>) {
    if let Some(number) = experiment {
        config.experiment.number = number;
    }
    if let Some(episode) = episode {
        config.experiment.episode = episode;
    }
}
