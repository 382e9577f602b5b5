//! Inspect command implementation

use super::render_structured;
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, InspectArgs};
use crate::io::{CheckpointRecord, CheckpointStore};
use crate::meta::Mode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Training statistics and layout of one checkpoint
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointReport {
    pub episode: u64,
    pub mode: Mode,
    pub backbone_seed: u64,
    pub meta_updates: u64,
    pub total_val_loss: Option<f32>,
    pub overall_iou: Option<f32>,
    pub mean_iou: BTreeMap<String, f32>,
    pub tensors: Vec<(String, Vec<usize>)>,
}

impl From<&CheckpointRecord> for CheckpointReport {
    fn from(record: &CheckpointRecord) -> Self {
        Self {
            episode: record.episode,
            mode: record.mode,
            backbone_seed: record.backbone_seed,
            meta_updates: record.optimizer_state.head.step,
            total_val_loss: record.total_val_loss,
            overall_iou: record.stats().overall_iou(),
            mean_iou: record.mean_iou.clone(),
            tensors: record
                .model_state
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.shape.clone()))
                .collect(),
        }
    }
}

pub fn run_inspect(args: InspectArgs, level: LogLevel) -> Result<(), String> {
    let mut config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut config, args.experiment, args.episode);

    let store = CheckpointStore::from_config(&config);
    let record = store.load_configured().map_err(|e| e.to_string())?;
    let report = CheckpointReport::from(&record);

    if let Some(rendered) = render_structured(&report, args.format)? {
        println!("{rendered}");
        return Ok(());
    }

    log(level, LogLevel::Normal, "Checkpoint Information:");
    println!("  Episode: {}", report.episode);
    println!("  Mode: {}", report.mode);
    println!("  Backbone seed: {}", report.backbone_seed);
    println!("  Meta updates: {}", report.meta_updates);
    if let Some(loss) = report.total_val_loss {
        println!("  Mean validation loss: {loss:.4}");
    }
    if let Some(iou) = report.overall_iou {
        println!("  Mean IoU: {iou:.4}");
    }
    for (class, iou) in &report.mean_iou {
        println!("    {class}: {iou:.4}");
    }

    if level == LogLevel::Verbose {
        log(level, LogLevel::Verbose, "\nTensors:");
        for (name, shape) in &report.tensors {
            log(level, LogLevel::Verbose, &format!("  {name}: {shape:?}"));
        }
    }

    Ok(())
}
