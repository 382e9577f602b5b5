//! Per-pixel cross-entropy loss for segmentation logits

use super::LossFn;
use crate::autograd::{BackwardOp, GradCell};
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Softmax cross-entropy averaged over every pixel of every example.
///
/// Predictions are logits shaped `[N, C, H, W]`; targets are class labels
/// shaped `[N, H, W]` (or `[N, 1, H, W]`) stored as whole numbers.
///
/// L = -mean_p log(softmax(logits_p)[label_p])
///
/// # Example
///
/// ```
/// use leoseg::train::{LossFn, PixelCrossEntropy};
/// use leoseg::Tensor;
///
/// let logits = Tensor::from_shape(&[1, 2, 1, 2], vec![2.0, -1.0, 0.0, 1.0], true).unwrap();
/// let mask = Tensor::from_shape(&[1, 1, 2], vec![0.0, 1.0], false).unwrap();
///
/// let loss = PixelCrossEntropy.forward(&logits, &mask).unwrap();
/// assert!(loss.item() > 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelCrossEntropy;

impl PixelCrossEntropy {
    /// Class label of every pixel, checked against the logits' geometry.
    pub(crate) fn labels(logits: &Tensor, targets: &Tensor) -> Result<Vec<usize>> {
        let [n, c, h, w] = logits.dims4()?;
        let spatial_ok = match targets.shape() {
            &[tn, th, tw] => (tn, th, tw) == (n, h, w),
            &[tn, 1, th, tw] => (tn, th, tw) == (n, h, w),
            _ => false,
        };
        if !spatial_ok {
            return Err(Error::shape("pixel_cross_entropy", &[n, h, w], targets.shape()));
        }

        targets
            .data()
            .iter()
            .map(|&label| {
                if label >= 0.0 && label.fract() == 0.0 && (label as usize) < c {
                    Ok(label as usize)
                } else {
                    Err(Error::InvalidTask(format!(
                        "mask label {label} is not one of {c} classes"
                    )))
                }
            })
            .collect()
    }
}

impl LossFn for PixelCrossEntropy {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        let labels = Self::labels(predictions, targets)?;
        let [n, c, h, w] = predictions.dims4()?;
        let plane = h * w;
        let pixels = (n * plane).max(1) as f32;
        let logits = predictions.data();

        // d(CE)/d(logits) = (softmax - onehot) / pixels
        let mut grad = Array1::<f32>::zeros(logits.len());
        let mut total = 0.0f32;

        for i in 0..n {
            for p in 0..plane {
                let idx = |class: usize| (i * c + class) * plane + p;
                let max = (0..c).map(|k| logits[idx(k)]).fold(f32::NEG_INFINITY, f32::max);
                let denom: f32 = (0..c).map(|k| (logits[idx(k)] - max).exp()).sum();
                let label = labels[i * plane + p];

                total += denom.ln() + max - logits[idx(label)];
                for k in 0..c {
                    let prob = (logits[idx(k)] - max).exp() / denom;
                    let onehot = if k == label { 1.0 } else { 0.0 };
                    grad[idx(k)] = (prob - onehot) / pixels;
                }
            }
        }

        let requires_grad = predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![total / pixels], requires_grad);

        if requires_grad {
            loss.set_backward_op(Rc::new(PixelCrossEntropyBackward {
                predictions: predictions.clone(),
                grad,
                result_grad: loss.grad_cell(),
            }));
        }

        Ok(loss)
    }

    fn name(&self) -> &'static str {
        "PixelCrossEntropy"
    }
}

struct PixelCrossEntropyBackward {
    predictions: Tensor,
    grad: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for PixelCrossEntropyBackward {
    fn backward(&self) {
        let Some(upstream) = self.result_grad.borrow_mut().take() else {
            return;
        };
        let grad = &self.grad * upstream[0];
        if self.predictions.requires_grad() {
            self.predictions.accumulate_grad(grad);
            if let Some(op) = self.predictions.backward_op() {
                op.backward();
            }
        }
    }
}
