//! Activation autograd operations: relu, dropout

use super::propagate_grad;
use crate::autograd::{BackwardOp, Context, GradCell, Tensor};
use ndarray::Array1;
use rand::Rng;
use std::rc::Rc;

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        // ∂L/∂a = ∂L/∂out * (a > 0)
        let grad_a = grad * &self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
        propagate_grad(&self.a, grad_a);
    }
}

/// Inverted dropout.
///
/// Zeroes each element with probability `rate` and rescales survivors by
/// `1 / (1 - rate)`. Identity outside training mode or when `rate == 0`.
pub fn dropout(a: &Tensor, rate: f32, ctx: &mut Context) -> Tensor {
    if !ctx.is_training() || rate <= 0.0 {
        return a.clone();
    }

    let keep = 1.0 - rate;
    let rng = ctx.rng();
    let mask: Array1<f32> = (0..a.len())
        .map(|_| if rng.random::<f32>() < keep { 1.0 / keep } else { 0.0 })
        .collect();

    let data = a.data() * &mask;
    let requires_grad = a.requires_grad();
    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(DropoutBackward {
            a: a.clone(),
            mask,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct DropoutBackward {
    a: Tensor,
    mask: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for DropoutBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        propagate_grad(&self.a, grad * &self.mask);
    }
}
