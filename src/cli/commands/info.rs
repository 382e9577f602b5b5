//! Info command implementation

use super::render_structured;
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, InfoArgs, LeoConfig};
use crate::io::CheckpointStore;
use crate::model::{FeatureDecoder, SegmentationHead};
use serde::Serialize;
use std::path::PathBuf;

/// Summary of a configuration and the experiment directory it points at
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub experiment: u32,
    pub model_dir: PathBuf,
    pub directory_exists: bool,
    pub checkpoints: Vec<u64>,
    pub meta_parameters: usize,
    pub config: LeoConfig,
}

/// Number of trainable meta-parameters of the decoder and head
pub fn meta_parameter_count() -> usize {
    let decoder: usize = FeatureDecoder::parameter_shapes()
        .iter()
        .map(|(_, shape)| shape.iter().product::<usize>())
        .sum();
    decoder + SegmentationHead::weight_shape().iter().product::<usize>()
}

/// Inspect the experiment directory without creating anything
pub fn build_report(config: LeoConfig) -> Result<InfoReport, String> {
    let store = CheckpointStore::from_config(&config);
    let directory_exists = store.dir().is_dir();
    let checkpoints = if directory_exists {
        store.list_episodes().map_err(|e| e.to_string())?
    } else {
        Vec::new()
    };
    Ok(InfoReport {
        experiment: config.experiment.number,
        model_dir: store.dir().to_path_buf(),
        directory_exists,
        checkpoints,
        meta_parameters: meta_parameter_count(),
        config,
    })
}

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let mut config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut config, args.experiment, None);
    let report = build_report(config)?;

    if let Some(rendered) = render_structured(&report, args.format)? {
        println!("{rendered}");
        return Ok(());
    }

    log(level, LogLevel::Normal, "Configuration Info:");
    println!();
    println!("Experiment: {}", report.experiment);
    println!("Model dir: {}", report.model_dir.display());
    println!("Meta-parameters: {}", report.meta_parameters);
    if !report.directory_exists {
        println!("Status: new (directory not created yet)");
    } else if report.checkpoints.is_empty() {
        println!("Status: no checkpoints");
    } else {
        println!("Checkpoints: {:?}", report.checkpoints);
    }
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "Outer/inner/finetuning lr: {}/{}/{}",
            report.config.hyperparameters.outer_loop_lr,
            report.config.hyperparameters.inner_loop_lr,
            report.config.hyperparameters.finetuning_lr
        ),
    );

    Ok(())
}
