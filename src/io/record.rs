//! Checkpoint record

use super::ParameterState;
use crate::meta::{Mode, OptimizerState, TrainStats};
use crate::optim::AdamState;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything needed to resume training at an episode boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub mode: Mode,
    pub episode: u64,
    /// Decoder parameters and head weight
    pub model_state: ParameterState,
    pub optimizer_state: OptimizerState,
    /// Seed the frozen backbone was drawn from
    pub backbone_seed: u64,
    pub aux_loss: Option<f32>,
    pub total_val_loss: Option<f32>,
    #[serde(default)]
    pub mean_iou: BTreeMap<String, f32>,
}

impl CheckpointRecord {
    /// Training statistics captured in the record
    pub fn stats(&self) -> TrainStats {
        TrainStats {
            mode: self.mode,
            episode: self.episode,
            total_val_loss: self.total_val_loss,
            mean_iou: self.mean_iou.clone(),
            aux_loss: self.aux_loss,
        }
    }

    /// Reject NaN and infinite values, which JSON cannot carry
    pub fn check_finite(&self) -> Result<()> {
        check_values("model_state", self.model_state.data.iter().copied())?;
        check_adam("optimizer_state.decoder", &self.optimizer_state.decoder)?;
        check_adam("optimizer_state.head", &self.optimizer_state.head)?;
        check_values("aux_loss", self.aux_loss)?;
        check_values("total_val_loss", self.total_val_loss)?;
        check_values("mean_iou", self.mean_iou.values().copied())
    }
}

fn check_adam(field: &str, state: &AdamState) -> Result<()> {
    check_values(field, [state.lr, state.beta1, state.beta2, state.epsilon])?;
    for moment in state.first_moments.iter().chain(&state.second_moments).flatten() {
        check_values(field, moment.iter().copied())?;
    }
    Ok(())
}

fn check_values(field: &str, values: impl IntoIterator<Item = f32>) -> Result<()> {
    match values.into_iter().find(|v| !v.is_finite()) {
        Some(v) => Err(Error::Serialization(format!(
            "checkpoint field {field} holds non-finite value {v}"
        ))),
        None => Ok(()),
    }
}
