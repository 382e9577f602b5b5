//! Frozen convolutional backbone

use super::{he_uniform, DOWNSAMPLE_FACTOR, IMAGE_CHANNELS, LATENT_CHANNELS, SKIP_CHANNELS};
use crate::autograd::{conv2d, relu, Conv2dSpec};
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Output channels of the five stride-2 stages
const STAGE_CHANNELS: [usize; 5] = [
    SKIP_CHANNELS[0],
    SKIP_CHANNELS[1],
    SKIP_CHANNELS[2],
    SKIP_CHANNELS[3],
    320,
];

const STAGE_SPEC: Conv2dSpec = Conv2dSpec::new(3, 2, 1);
const EXPAND_SPEC: Conv2dSpec = Conv2dSpec::new(1, 1, 0);

/// Encoder outputs for one batch of images
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Deepest feature map, a leaf that accepts gradients
    pub latent: Tensor,
    /// Skip feature maps ordered shallow to deep
    pub skips: [Tensor; 4],
}

#[derive(Debug, Clone)]
struct ConvLayer {
    weight: Tensor,
    bias: Tensor,
}

impl ConvLayer {
    fn new(in_channels: usize, out_channels: usize, kernel: usize, rng: &mut StdRng) -> Self {
        Self {
            weight: he_uniform(
                &[out_channels, in_channels, kernel, kernel],
                in_channels * kernel * kernel,
                rng,
                false,
            ),
            bias: Tensor::zeros(&[out_channels], false),
        }
    }

    fn forward(&self, x: &Tensor, spec: Conv2dSpec) -> Result<Tensor> {
        Ok(relu(&conv2d(x, &self.weight, Some(&self.bias), spec)?))
    }
}

/// Fixed-topology backbone with frozen weights.
///
/// Weights are drawn from a seeded generator, so the seed alone identifies
/// the backbone and is what checkpoints record.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    stages: Vec<ConvLayer>,
    expand: ConvLayer,
    seed: u64,
}

impl FeatureEncoder {
    /// Build the backbone from `seed`
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut in_channels = IMAGE_CHANNELS;
        let stages = STAGE_CHANNELS
            .iter()
            .map(|&out_channels| {
                let layer = ConvLayer::new(in_channels, out_channels, STAGE_SPEC.kernel, &mut rng);
                in_channels = out_channels;
                layer
            })
            .collect();
        let expand = ConvLayer::new(in_channels, LATENT_CHANNELS, EXPAND_SPEC.kernel, &mut rng);

        Self {
            stages,
            expand,
            seed,
        }
    }

    /// Seed the weights were drawn from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Extract skips and the latent from an NCHW image batch.
    ///
    /// Height and width must be positive multiples of 32. The returned latent
    /// is detached from the backbone and flagged as requiring gradients.
    pub fn encode(&self, image: &Tensor) -> Result<Encoded> {
        let [n, c, h, w] = image.dims4()?;
        let aligned = |len: usize| len > 0 && len % DOWNSAMPLE_FACTOR == 0;
        if c != IMAGE_CHANNELS || !aligned(h) || !aligned(w) {
            let round = |len: usize| len.div_ceil(DOWNSAMPLE_FACTOR).max(1) * DOWNSAMPLE_FACTOR;
            return Err(Error::shape(
                "FeatureEncoder::encode",
                &[n, IMAGE_CHANNELS, round(h), round(w)],
                image.shape(),
            ));
        }

        let mut skips = Vec::with_capacity(SKIP_CHANNELS.len());
        let mut x = image.clone();
        for stage in &self.stages {
            x = stage.forward(&x, STAGE_SPEC)?;
            if skips.len() < SKIP_CHANNELS.len() {
                skips.push(x.clone());
            }
        }
        let latent = self.expand.forward(&x, EXPAND_SPEC)?.detach(true);

        let skips: [Tensor; 4] = skips
            .try_into()
            .map_err(|_| Error::Unsupported("encoder produced the wrong number of skips".to_string()))?;
        tracing::trace!(latent = ?latent.shape(), "encoded batch");

        Ok(Encoded { latent, skips })
    }
}
