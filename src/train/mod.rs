//! Losses and metrics for segmentation training
//!
//! - [`PixelCrossEntropy`]: the training and validation loss of both loops
//! - [`MeanIoU`]: foreground overlap reported per class in the episode stats

mod loss;
mod metrics;

pub use loss::{LossFn, PixelCrossEntropy};
pub use metrics::{argmax_channels, iou, MeanIoU, Metric};
