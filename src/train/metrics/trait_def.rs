//! Core Metric trait definition

use crate::{Result, Tensor};

/// Trait for evaluation metrics
pub trait Metric {
    /// Compute the metric given predictions and targets
    ///
    /// Fails when the targets do not line up with the predictions.
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32>;

    /// Name of the metric
    fn name(&self) -> &str;

    /// Whether higher values are better (true) or lower (false)
    fn higher_is_better(&self) -> bool {
        true
    }
}
