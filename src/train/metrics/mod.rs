//! Evaluation metrics for segmentation
//!
//! - [`MeanIoU`] - foreground intersection over union, averaged over examples

mod iou;
mod trait_def;


pub use iou::{argmax_channels, iou, MeanIoU};
pub use trait_def::Metric;
