//! Loss function trait

use crate::{Result, Tensor};

/// Trait for loss functions
pub trait LossFn {
    /// Compute loss given predictions and targets
    ///
    /// Returns a scalar loss tensor wired into the graph of `predictions`,
    /// or a shape error when the two do not line up.
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor>;

    /// Name of the loss function
    fn name(&self) -> &str;
}
