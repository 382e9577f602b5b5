//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::Tensor;

/// Plain gradient descent `θ ← θ - lr * g`, the step taken by the inner and
/// finetuning loops.
#[derive(Debug, Clone)]
pub struct SGD {
    lr: f32,
}

impl SGD {
    pub fn plain(lr: f32) -> Self {
        Self { lr }
    }
}

impl Optimizer for SGD {
    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        for param in params.iter_mut() {
            if let Some(grad) = param.grad() {
                param.data_mut().scaled_add(-self.lr, &grad);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
