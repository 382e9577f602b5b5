//! Intersection over union for binary foreground masks

use super::Metric;
use crate::train::PixelCrossEntropy;
use crate::{Result, Tensor};

/// Arg-max class of every pixel of `[N, C, H, W]` logits, in `[N, H, W]` order.
///
/// Ties resolve to the lowest class index.
pub fn argmax_channels(logits: &Tensor) -> Result<Vec<usize>> {
    let [n, c, h, w] = logits.dims4()?;
    let plane = h * w;
    let data = logits.data();

    let mut classes = Vec::with_capacity(n * plane);
    for i in 0..n {
        for p in 0..plane {
            let mut best = 0;
            for k in 1..c {
                if data[(i * c + k) * plane + p] > data[(i * c + best) * plane + p] {
                    best = k;
                }
            }
            classes.push(best);
        }
    }
    Ok(classes)
}

/// |pred ∩ truth| / |pred ∪ truth| over positive pixels.
///
/// An empty union (neither mask has a positive pixel) counts as a perfect
/// match and scores 1.0.
pub fn iou(pred: &[bool], truth: &[bool]) -> f32 {
    let (intersection, union) = pred
        .iter()
        .zip(truth)
        .fold((0usize, 0usize), |(inter, uni), (&p, &t)| {
            (inter + usize::from(p && t), uni + usize::from(p || t))
        });
    if union == 0 {
        1.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Mean foreground IoU over a batch of predictions.
///
/// A pixel is positive when its label (ground truth) or arg-max class
/// (prediction) is not the background class 0.
///
/// # Example
///
/// ```
/// use leoseg::train::{MeanIoU, Metric};
/// use leoseg::Tensor;
///
/// // one example, two pixels; logits favour class 1 on the second pixel
/// let logits = Tensor::from_shape(&[1, 2, 1, 2], vec![1.0, 0.0, 0.0, 1.0], false).unwrap();
/// let mask = Tensor::from_shape(&[1, 1, 2], vec![0.0, 1.0], false).unwrap();
///
/// assert_eq!(MeanIoU.compute(&logits, &mask).unwrap(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanIoU;

impl MeanIoU {
    /// IoU of each example in the batch
    pub fn per_example(&self, logits: &Tensor, masks: &Tensor) -> Result<Vec<f32>> {
        let labels = PixelCrossEntropy::labels(logits, masks)?;
        let predicted = argmax_channels(logits)?;
        let [n, _, h, w] = logits.dims4()?;
        let plane = h * w;

        Ok((0..n)
            .map(|i| {
                let range = i * plane..(i + 1) * plane;
                let pred: Vec<bool> = predicted[range.clone()].iter().map(|&k| k != 0).collect();
                let truth: Vec<bool> = labels[range].iter().map(|&k| k != 0).collect();
                iou(&pred, &truth)
            })
            .collect())
    }
}

impl Metric for MeanIoU {
    /// Mean of [`MeanIoU::per_example`]
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32> {
        let scores = self.per_example(predictions, targets)?;
        Ok(scores.iter().sum::<f32>() / scores.len().max(1) as f32)
    }

    fn name(&self) -> &'static str {
        "MeanIoU"
    }
}
