//! Autograd operations with backward passes
//!
//! This module provides differentiable operations for automatic differentiation.

mod activations;
mod basic;
mod conv;
mod normalize;
mod shape;

// Re-export all public operations
pub use activations::{dropout, relu};
pub use basic::{add, mean, mul, scale, sub, sum};
pub use conv::{conv2d, conv_transpose2d, Conv2dSpec};
pub use normalize::batch_norm2d;
pub use shape::concat_channels;

use super::Tensor;
use ndarray::Array1;

/// Accumulate `grad` into `t` and continue the backward walk from it.
pub(crate) fn propagate_grad(t: &Tensor, grad: Array1<f32>) {
    if t.requires_grad() {
        t.accumulate_grad(grad);
        if let Some(op) = t.backward_op() {
            op.backward();
        }
    }
}
