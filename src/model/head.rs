//! Segmentation head

use super::{he_uniform, FeatureDecoder, IMAGE_CHANNELS, NUM_CLASSES};
use crate::autograd::{concat_channels, conv2d, Conv2dSpec};
use crate::{Result, Tensor};
use rand::rngs::StdRng;

const HEAD_SPEC: Conv2dSpec = Conv2dSpec::new(3, 1, 1);

/// Single bias-free 3x3 convolution over decoded features and the image.
///
/// The head owns no weights: callers pass either the meta weight or a
/// task-local copy, so both go through the same computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentationHead;

impl SegmentationHead {
    /// Input channels: decoded features plus image channels
    pub fn input_channels() -> usize {
        FeatureDecoder::output_channels() + IMAGE_CHANNELS
    }

    /// Shape of the head weight `[classes, input channels, 3, 3]`
    pub fn weight_shape() -> [usize; 4] {
        [NUM_CLASSES, Self::input_channels(), HEAD_SPEC.kernel, HEAD_SPEC.kernel]
    }

    /// Fresh head weight
    pub fn init_weight(rng: &mut StdRng) -> Tensor {
        let shape = Self::weight_shape();
        he_uniform(&shape, shape[1] * shape[2] * shape[3], rng, true)
    }

    /// Per-pixel class logits `[N, classes, H, W]`
    pub fn classify(&self, features: &Tensor, image: &Tensor, weight: &Tensor) -> Result<Tensor> {
        let input = concat_channels(features, image)?;
        conv2d(&input, weight, None, HEAD_SPEC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use rand::SeedableRng;

    #[test]
    fn test_weight_shape() {
        assert_eq!(SegmentationHead::weight_shape(), [2, 51, 3, 3]);
    }

    #[test]
    fn test_classify_shape() {
        let weight = SegmentationHead::init_weight(&mut StdRng::seed_from_u64(0));
        let features = Tensor::zeros(&[2, 48, 8, 8], false);
        let image = Tensor::zeros(&[2, 3, 8, 8], false);
        let logits = SegmentationHead.classify(&features, &image, &weight).unwrap();
        assert_eq!(logits.shape(), &[2, NUM_CLASSES, 8, 8]);
    }

    #[test]
    fn test_classify_uses_supplied_weight() {
        let features = Tensor::from_vec(vec![1.0; 48 * 4], false).reshape(&[1, 48, 2, 2]).unwrap();
        let image = Tensor::zeros(&[1, 3, 2, 2], false);
        let zero = Tensor::zeros(&SegmentationHead::weight_shape(), true);
        let logits = SegmentationHead.classify(&features, &image, &zero).unwrap();
        assert!(logits.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_classify_rejects_mismatched_image() {
        let weight = SegmentationHead::init_weight(&mut StdRng::seed_from_u64(0));
        let features = Tensor::zeros(&[1, 48, 8, 8], false);
        let image = Tensor::zeros(&[1, 3, 4, 4], false);
        assert!(matches!(
            SegmentationHead.classify(&features, &image, &weight),
            Err(Error::Shape { .. })
        ));
    }
}
