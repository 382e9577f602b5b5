//! Meta-learning loop
//!
//! One episode runs, per task, a latent-space inner loop
//! ([`InnerLoopAdapter`]) followed by weight-space fine-tuning of a
//! task-local copy of the head ([`OuterLoopFinetuner`]). In training mode
//! the per-task meta-gradients are averaged and applied once by
//! [`MetaOptimizer`]. [`MetaLearner`] drives the whole episode.

mod adapter;
mod finetune;
mod learner;
mod optimizer;
mod stats;

pub use adapter::{Adaptation, InnerLoopAdapter};
pub use finetune::{FinetuneOutcome, OuterLoopFinetuner, TaskGradients};
pub use learner::MetaLearner;
pub use optimizer::{MetaGradientAccumulator, MetaOptimizer, OptimizerState};
pub use stats::{Mode, TrainStats};

use crate::autograd::{grad, GradMode};
use crate::{Error, Result, Tensor};
use ndarray::Array1;

/// First-order gradient of `loss` with respect to a single tensor
pub(crate) fn first_order_grad(loss: &Tensor, input: &Tensor) -> Result<Array1<f32>> {
    grad(loss, &[input], GradMode::first_order())?
        .pop()
        .ok_or_else(|| Error::Unsupported("gradient of an empty input list".into()))
}
