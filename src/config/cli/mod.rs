//! CLI argument parsing
//!
//! ```bash
//! leoseg validate config.yaml
//! leoseg info config.yaml --format json
//! leoseg inspect config.yaml --episode -1
//! ```

mod core;
mod types;

pub use core::{apply_overrides, parse_args, Cli, Command, InfoArgs, InspectArgs, ValidateArgs};
pub use types::OutputFormat;
