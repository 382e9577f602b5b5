//! Experiment configuration
//!
//! - [`LeoConfig`]: typed schema with defaults for every optional section
//! - [`load_config`]: YAML or JSON by extension, validated on load
//! - [`validate_config`]: range checks reported as [`ValidationError`]
//! - [`Cli`]: command-line arguments of the `leoseg` binary

pub mod cli;
mod loader;
mod schema;
pub mod validate;

pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, InspectArgs, OutputFormat, ValidateArgs,
};
pub use loader::{load_config, parse_config, ConfigFormat};
pub use schema::{
    DataParams, EpisodeSelector, ExperimentSpec, Hyperparameters, LeoConfig, ValidationSchedule,
};
pub use validate::{validate_config, ValidationError};
