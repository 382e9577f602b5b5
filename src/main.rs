//! leoseg CLI
//!
//! Configuration and checkpoint tooling for few-shot segmentation
//! meta-training.
//!
//! # Usage
//!
//! ```bash
//! # Validate config
//! leoseg validate config.yaml
//!
//! # Show config info and the checkpoints of the experiment
//! leoseg info config.yaml --format json
//!
//! # Print statistics of the latest checkpoint
//! leoseg inspect config.yaml --episode -1
//! ```

use clap::Parser;
use leoseg::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
