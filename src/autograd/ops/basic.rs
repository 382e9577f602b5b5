//! Basic autograd operations: add, sub, mul, scale, sum, mean

use super::propagate_grad;
use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::{Error, Result};
use ndarray::Array1;
use std::rc::Rc;

fn same_shape(op: &'static str, a: &Tensor, b: &Tensor) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::shape(op, a.shape(), b.shape()));
    }
    Ok(())
}

/// Add two tensors
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    same_shape("add", a, b)?;
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            sign: 1.0,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

/// Subtract `b` from `a`
pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    same_shape("sub", a, b)?;
    let data = a.data() - b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            sign: -1.0,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    sign: f32,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        // ∂L/∂b = ±∂L/∂out
        let grad_b = &grad * self.sign;
        propagate_grad(&self.a, grad);
        propagate_grad(&self.b, grad_b);
    }
}

/// Multiply two tensors element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    same_shape("mul", a, b)?;
    let data = a.data() * b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        // ∂L/∂a = ∂L/∂out * b, ∂L/∂b = ∂L/∂out * a
        let grad_a = &grad * self.b.data();
        let grad_b = &grad * self.a.data();
        propagate_grad(&self.a, grad_a);
        propagate_grad(&self.b, grad_b);
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::with_shape(data, a.shape().to_vec(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        propagate_grad(&self.a, grad * self.factor);
    }
}

/// Sum all elements
pub fn sum(a: &Tensor) -> Tensor {
    reduce(a, 1.0)
}

/// Mean of all elements
pub fn mean(a: &Tensor) -> Tensor {
    let n = a.len().max(1) as f32;
    reduce(a, 1.0 / n)
}

fn reduce(a: &Tensor, factor: f32) -> Tensor {
    let data = Array1::from(vec![a.data().sum() * factor]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReduceBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReduceBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ReduceBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        // ∂L/∂a_i = ∂L/∂out * factor (broadcast)
        let grad_a = Array1::from_elem(self.a.len(), grad[0] * self.factor);
        propagate_grad(&self.a, grad_a);
    }
}
