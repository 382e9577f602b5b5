//! Loss functions for training
//!
//! - [`PixelCrossEntropy`] - per-pixel softmax cross-entropy for segmentation

mod pixel_cross_entropy;
mod traits;

pub use pixel_cross_entropy::PixelCrossEntropy;
pub use traits::LossFn;
