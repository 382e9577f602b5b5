//! Segmentation network: frozen encoder, meta-learned decoder and head
//!
//! The topology is fixed. Channel counts below are shared by the encoder
//! (which produces skips and the latent), the decoder (which consumes them)
//! and the checkpoint loader (which validates parameter shapes).

mod decoder;
mod encoder;
mod head;
mod params;

pub use decoder::{DecoderStage, FeatureDecoder};
pub use encoder::{Encoded, FeatureEncoder};
pub use head::SegmentationHead;
pub use params::MetaParameters;

use crate::Tensor;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;

/// Channels of an input image
pub const IMAGE_CHANNELS: usize = 3;

/// Output classes of the head (background and foreground)
pub const NUM_CLASSES: usize = 2;

/// Channels of the encoder skip connections, shallow to deep
pub const SKIP_CHANNELS: [usize; 4] = [16, 24, 32, 96];

/// Channels of the latent
pub const LATENT_CHANNELS: usize = 1280;

/// Spatial reduction between the image and the latent
pub const DOWNSAMPLE_FACTOR: usize = 32;

/// Running channel increment of the decoder stages
pub const DECODER_BASE: usize = 8;

/// Tensor of `shape` drawn from the He-uniform distribution for `fan_in`.
pub(crate) fn he_uniform(shape: &[usize], fan_in: usize, rng: &mut StdRng, requires_grad: bool) -> Tensor {
    let bound = (6.0 / fan_in.max(1) as f32).sqrt();
    let len: usize = shape.iter().product();
    let data: Array1<f32> = (0..len).map(|_| rng.random_range(-bound..bound)).collect();
    Tensor::with_shape(data, shape.to_vec(), requires_grad)
}
