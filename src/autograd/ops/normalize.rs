//! Normalization autograd operations: batch_norm2d

use super::propagate_grad;
use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::{Error, Result};
use ndarray::Array1;
use std::rc::Rc;

/// Batch normalization over an NCHW tensor using batch statistics.
///
/// Each channel is normalized with the mean and biased variance taken over
/// the batch and spatial axes, then scaled by `gamma` and shifted by `beta`:
/// y = gamma * (x - mean) / sqrt(var + epsilon) + beta
pub fn batch_norm2d(x: &Tensor, gamma: &Tensor, beta: &Tensor, epsilon: f32) -> Result<Tensor> {
    let [n, c, h, w] = x.dims4()?;
    if gamma.len() != c {
        return Err(Error::shape("batch_norm2d", &[c], gamma.shape()));
    }
    if beta.len() != c {
        return Err(Error::shape("batch_norm2d", &[c], beta.shape()));
    }

    let plane = h * w;
    let count = (n * plane) as f32;
    let data = x.data();

    let mut normalized = Array1::<f32>::zeros(x.len());
    let mut inv_std = Array1::<f32>::zeros(c);
    let mut out = Array1::<f32>::zeros(x.len());

    for ch in 0..c {
        let offsets = channel_offsets(n, c, ch, plane);

        let mean = offsets.clone().map(|i| data[i]).sum::<f32>() / count;
        let variance = offsets.clone().map(|i| (data[i] - mean).powi(2)).sum::<f32>() / count;
        let istd = 1.0 / (variance + epsilon).sqrt();
        inv_std[ch] = istd;

        let (g, b) = (gamma.data()[ch], beta.data()[ch]);
        for i in offsets {
            let x_hat = (data[i] - mean) * istd;
            normalized[i] = x_hat;
            out[i] = g * x_hat + b;
        }
    }

    let requires_grad = x.requires_grad() || gamma.requires_grad() || beta.requires_grad();
    let mut result = Tensor::with_shape(out, vec![n, c, h, w], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(BatchNormBackward {
            x: x.clone(),
            gamma: gamma.clone(),
            beta: beta.clone(),
            normalized,
            inv_std,
            dims: [n, c, plane],
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

/// Flat indices of one channel across the batch.
fn channel_offsets(
    n: usize,
    c: usize,
    ch: usize,
    plane: usize,
) -> impl Iterator<Item = usize> + Clone {
    (0..n).flat_map(move |i| {
        let start = (i * c + ch) * plane;
        start..start + plane
    })
}

struct BatchNormBackward {
    x: Tensor,
    gamma: Tensor,
    beta: Tensor,
    normalized: Array1<f32>,
    inv_std: Array1<f32>,
    dims: [usize; 3],
    result_grad: GradCell,
}

impl BackwardOp for BatchNormBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow_mut().take() else {
            return;
        };
        let [n, c, plane] = self.dims;
        let count = (n * plane) as f32;

        let mut grad_gamma = Array1::<f32>::zeros(c);
        let mut grad_beta = Array1::<f32>::zeros(c);
        let mut grad_x = Array1::<f32>::zeros(grad.len());

        for ch in 0..c {
            let offsets = channel_offsets(n, c, ch, plane);

            // ∂L/∂beta = Σ ∂L/∂y, ∂L/∂gamma = Σ ∂L/∂y * x_hat
            let sum_grad: f32 = offsets.clone().map(|i| grad[i]).sum();
            let sum_grad_xhat: f32 = offsets.clone().map(|i| grad[i] * self.normalized[i]).sum();
            grad_beta[ch] = sum_grad;
            grad_gamma[ch] = sum_grad_xhat;

            if self.x.requires_grad() {
                // ∂L/∂x_i = gamma * inv_std / m * (m * g_i - Σg - x_hat_i * Σ(g * x_hat))
                let scale = self.gamma.data()[ch] * self.inv_std[ch] / count;
                for i in offsets {
                    grad_x[i] =
                        scale * (count * grad[i] - sum_grad - self.normalized[i] * sum_grad_xhat);
                }
            }
        }

        propagate_grad(&self.beta, grad_beta);
        propagate_grad(&self.gamma, grad_gamma);
        propagate_grad(&self.x, grad_x);
    }
}
