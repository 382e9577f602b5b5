//! Shape autograd operations: channel concatenation

use super::propagate_grad;
use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::{Error, Result};
use ndarray::{s, Array1};
use std::rc::Rc;

/// Concatenate two NCHW tensors along the channel axis
pub fn concat_channels(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let [n, ca, h, w] = a.dims4()?;
    let [nb, cb, hb, wb] = b.dims4()?;
    if (n, h, w) != (nb, hb, wb) {
        return Err(Error::shape("concat_channels", &[n, cb, h, w], b.shape()));
    }

    let plane = h * w;
    let c = ca + cb;
    let mut data = Vec::with_capacity(n * c * plane);
    for i in 0..n {
        let a_start = i * ca * plane;
        let b_start = i * cb * plane;
        data.extend(a.data().slice(s![a_start..a_start + ca * plane]).iter());
        data.extend(b.data().slice(s![b_start..b_start + cb * plane]).iter());
    }

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::with_shape(Array1::from(data), vec![n, c, h, w], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ConcatBackward {
            a: a.clone(),
            b: b.clone(),
            batch: n,
            a_block: ca * plane,
            b_block: cb * plane,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct ConcatBackward {
    a: Tensor,
    b: Tensor,
    batch: usize,
    a_block: usize,
    b_block: usize,
    result_grad: GradCell,
}

impl BackwardOp for ConcatBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        let stride = self.a_block + self.b_block;
        let mut grad_a = Vec::with_capacity(self.batch * self.a_block);
        let mut grad_b = Vec::with_capacity(self.batch * self.b_block);
        for i in 0..self.batch {
            let start = i * stride;
            grad_a.extend(grad.slice(s![start..start + self.a_block]).iter());
            grad_b.extend(grad.slice(s![start + self.a_block..start + stride]).iter());
        }
        propagate_grad(&self.a, Array1::from(grad_a));
        propagate_grad(&self.b, Array1::from(grad_b));
    }
}
