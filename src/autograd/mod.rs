//! Tape-based autograd engine
//!
//! Provides reverse-mode automatic differentiation over flat `ndarray`
//! buffers. Each differentiable op records a [`BackwardOp`] on its result;
//! calling [`backward`] on a scalar walks the recorded graph.
//!
//! [`grad`] is the selective form used by the meta-learning loops: it returns
//! the gradient of a scalar with respect to chosen inputs and leaves their
//! gradient slots as it found them.
//!
//! ## Higher-order gradients
//!
//! Gradients are plain arrays, never graph nodes, so differentiating through
//! an update step is a first-order approximation. [`GradMode`] makes that
//! explicit: asking to retain the higher-order graph is rejected.

mod backward;
mod context;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::BackwardOp;
pub use context::Context;
pub use ops::*;
pub use tensor::{GradCell, Tensor};

use crate::{Error, Result};
use ndarray::Array1;

/// Perform backward pass on a tensor
pub fn backward(tensor: &mut Tensor, grad_output: Option<Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Initialize with ones for scalar loss
        let ones = Array1::ones(tensor.data().len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}

/// How [`grad`] differentiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradMode {
    retain_higher_order: bool,
}

impl GradMode {
    /// Gradients are detached values (no graph of the gradient is kept)
    pub const fn first_order() -> Self {
        Self {
            retain_higher_order: false,
        }
    }

    /// Request a differentiable gradient graph
    pub const fn higher_order() -> Self {
        Self {
            retain_higher_order: true,
        }
    }

    /// Whether the higher-order graph is retained
    pub fn retains_higher_order(&self) -> bool {
        self.retain_higher_order
    }
}

impl Default for GradMode {
    fn default() -> Self {
        Self::first_order()
    }
}

/// Gradient of a scalar `output` with respect to each of `inputs`.
///
/// Inputs that the output does not depend on get a zero gradient. The
/// inputs' own gradient slots are restored before returning; leaves outside
/// `inputs` that the graph reaches do accumulate, as with [`backward`].
pub fn grad(output: &Tensor, inputs: &[&Tensor], mode: GradMode) -> Result<Vec<Array1<f32>>> {
    if mode.retains_higher_order() {
        return Err(Error::Unsupported(
            "retaining the higher-order gradient graph".to_string(),
        ));
    }
    if output.len() != 1 {
        return Err(Error::shape("grad", &[1], output.shape()));
    }
    if let Some(pos) = inputs.iter().position(|t| !t.requires_grad()) {
        return Err(Error::Unsupported(format!(
            "gradient with respect to input {pos}, which does not require grad"
        )));
    }

    let saved: Vec<Option<Array1<f32>>> = inputs.iter().map(|t| t.take_grad()).collect();

    output.set_grad(Array1::ones(1));
    if let Some(op) = output.backward_op() {
        op.backward();
    }

    let grads = inputs
        .iter()
        .map(|t| t.take_grad().unwrap_or_else(|| Array1::zeros(t.len())))
        .collect();

    for (input, previous) in inputs.iter().zip(saved) {
        if let Some(previous) = previous {
            input.set_grad(previous);
        }
    }

    Ok(grads)
}
