//! Training statistics

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Phase an episode runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Adapt, validate and update the meta-parameters
    #[default]
    MetaTrain,
    /// Evaluate on meta-validation classes, no update
    MetaVal,
    /// Evaluate on held-out classes, no update
    MetaTest,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetaTrain => "meta_train",
            Self::MetaVal => "meta_val",
            Self::MetaTest => "meta_test",
        }
    }

    /// Whether episodes in this mode update the meta-parameters
    pub fn is_training(&self) -> bool {
        matches!(self, Self::MetaTrain)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "meta_train" => Ok(Self::MetaTrain),
            "meta_val" => Ok(Self::MetaVal),
            "meta_test" => Ok(Self::MetaTest),
            other => Err(Error::Config(format!(
                "unknown mode '{other}', expected meta_train, meta_val or meta_test"
            ))),
        }
    }
}

/// Statistics of the most recent episode
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainStats {
    pub mode: Mode,
    /// Episodes completed so far
    pub episode: u64,
    /// Mean validation loss over the last batch
    pub total_val_loss: Option<f32>,
    /// Mean IoU per class of the last batch
    #[serde(default)]
    pub mean_iou: BTreeMap<String, f32>,
    /// Auxiliary loss term; no regularizer currently contributes one
    #[serde(default)]
    pub aux_loss: Option<f32>,
}

impl TrainStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished episode
    pub fn update(&mut self, mode: Mode, total_val_loss: f32, mean_iou: BTreeMap<String, f32>) {
        self.mode = mode;
        self.episode += 1;
        self.total_val_loss = Some(total_val_loss);
        self.mean_iou = mean_iou;
    }

    /// Mean of the per-class IoU values
    pub fn overall_iou(&self) -> Option<f32> {
        if self.mean_iou.is_empty() {
            return None;
        }
        Some(self.mean_iou.values().sum::<f32>() / self.mean_iou.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings() {
        for mode in [Mode::MetaTrain, Mode::MetaVal, Mode::MetaTest] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
        assert!("train".parse::<Mode>().is_err());
        assert!(Mode::MetaTrain.is_training());
        assert!(!Mode::MetaTest.is_training());
    }

    #[test]
    fn test_update_increments_episode() {
        let mut stats = TrainStats::new();
        let ious = BTreeMap::from([("cat".to_string(), 0.5), ("dog".to_string(), 1.0)]);
        stats.update(Mode::MetaVal, 0.7, ious);

        assert_eq!(stats.episode, 1);
        assert_eq!(stats.mode, Mode::MetaVal);
        assert_eq!(stats.total_val_loss, Some(0.7));
        assert_eq!(stats.overall_iou(), Some(0.75));
    }

    #[test]
    fn test_overall_iou_empty() {
        assert_eq!(TrainStats::new().overall_iou(), None);
    }
}
