//! A single few-shot segmentation task

use crate::{Error, Result, Tensor};
use ndarray::s;

/// Training and validation examples of one class.
///
/// Images are NCHW, masks are `[N, H, W]` class labels. Construction checks
/// that both splits are non-empty and that images and masks pair up.
#[derive(Debug, Clone)]
pub struct Task {
    train_images: Tensor,
    train_masks: Tensor,
    val_images: Tensor,
    val_masks: Tensor,
    class_name: String,
}

impl Task {
    /// Validate and bundle one task.
    ///
    /// Masks may be given as `[N, H, W]` or `[N, 1, H, W]`; they are stored
    /// as `[N, H, W]`.
    pub fn new(
        train_images: Tensor,
        train_masks: Tensor,
        val_images: Tensor,
        val_masks: Tensor,
        class_name: impl Into<String>,
    ) -> Result<Self> {
        let class_name = class_name.into();
        let train_masks = pair("training", &class_name, &train_images, train_masks)?;
        let val_masks = pair("validation", &class_name, &val_images, val_masks)?;

        let [_, tc, th, tw] = train_images.dims4()?;
        let [_, vc, vh, vw] = val_images.dims4()?;
        if (tc, th, tw) != (vc, vh, vw) {
            return Err(Error::InvalidTask(format!(
                "class {class_name}: training images are {tc}x{th}x{tw} but validation images are {vc}x{vh}x{vw}"
            )));
        }

        Ok(Self {
            train_images,
            train_masks,
            val_images,
            val_masks,
            class_name,
        })
    }

    pub fn train_images(&self) -> &Tensor {
        &self.train_images
    }

    pub fn train_masks(&self) -> &Tensor {
        &self.train_masks
    }

    pub fn val_images(&self) -> &Tensor {
        &self.val_images
    }

    pub fn val_masks(&self) -> &Tensor {
        &self.val_masks
    }

    /// Class the task segments
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Number of training examples
    pub fn num_train(&self) -> usize {
        self.train_images.shape()[0]
    }

    /// Number of validation examples
    pub fn num_val(&self) -> usize {
        self.val_images.shape()[0]
    }

    /// Validation example `index` as a batch of one
    pub fn val_example(&self, index: usize) -> Result<(Tensor, Tensor)> {
        Ok((
            example(&self.val_images, index)?,
            example(&self.val_masks, index)?,
        ))
    }
}

/// Check one split and return its mask as `[N, H, W]`.
fn pair(split: &str, class_name: &str, images: &Tensor, masks: Tensor) -> Result<Tensor> {
    let [n, _, h, w] = images.dims4()?;
    if n == 0 {
        return Err(Error::InvalidTask(format!(
            "class {class_name}: {split} split has no examples"
        )));
    }

    let dims = match masks.shape() {
        &[mn, mh, mw] | &[mn, 1, mh, mw] => (mn, mh, mw),
        other => return Err(Error::shape("Task::new", &[n, h, w], other)),
    };
    if dims.0 != n {
        return Err(Error::InvalidTask(format!(
            "class {class_name}: {split} split has {n} images but {} masks",
            dims.0
        )));
    }
    if (dims.1, dims.2) != (h, w) {
        return Err(Error::shape("Task::new", &[n, h, w], masks.shape()));
    }

    masks.reshape(&[n, h, w])
}

/// Slice example `index` off the leading axis.
fn example(t: &Tensor, index: usize) -> Result<Tensor> {
    let n = t.shape()[0];
    if index >= n {
        return Err(Error::InvalidTask(format!(
            "example {index} out of range for {n} examples"
        )));
    }
    let stride = t.len() / n;
    let data = t.data().slice(s![index * stride..(index + 1) * stride]).to_vec();
    let mut shape = t.shape().to_vec();
    shape[0] = 1;
    Tensor::from_shape(&shape, data, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> Tensor {
        Tensor::zeros(&[n, 3, 4, 4], false)
    }

    #[test]
    fn test_valid_task_normalizes_masks() {
        let task = Task::new(
            images(2),
            Tensor::zeros(&[2, 1, 4, 4], false),
            images(3),
            Tensor::zeros(&[3, 4, 4], false),
            "dog",
        )
        .unwrap();
        assert_eq!(task.train_masks().shape(), &[2, 4, 4]);
        assert_eq!(task.num_train(), 2);
        assert_eq!(task.num_val(), 3);
        assert_eq!(task.class_name(), "dog");
    }

    #[test]
    fn test_unpaired_masks_rejected() {
        let err = Task::new(
            images(2),
            Tensor::zeros(&[1, 4, 4], false),
            images(1),
            Tensor::zeros(&[1, 4, 4], false),
            "cat",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTask(msg) if msg.contains("2 images but 1 masks")));
    }

    #[test]
    fn test_empty_split_rejected() {
        let err = Task::new(
            images(1),
            Tensor::zeros(&[1, 4, 4], false),
            images(0),
            Tensor::zeros(&[0, 4, 4], false),
            "cat",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTask(_)));
    }

    #[test]
    fn test_mask_size_mismatch_rejected() {
        let result = Task::new(
            images(1),
            Tensor::zeros(&[1, 8, 8], false),
            images(1),
            Tensor::zeros(&[1, 4, 4], false),
            "cat",
        );
        assert!(matches!(result, Err(Error::Shape { .. })));
    }

    #[test]
    fn test_val_example_slices_one() {
        let data: Vec<f32> = (0..2 * 3 * 4 * 4).map(|v| v as f32).collect();
        let val = Tensor::from_shape(&[2, 3, 4, 4], data, false).unwrap();
        let masks = Tensor::from_shape(&[2, 4, 4], vec![1.0; 32], false).unwrap();
        let task = Task::new(images(1), Tensor::zeros(&[1, 4, 4], false), val, masks, "x").unwrap();

        let (img, mask) = task.val_example(1).unwrap();
        assert_eq!(img.shape(), &[1, 3, 4, 4]);
        assert_eq!(img.data()[0], 48.0);
        assert_eq!(mask.shape(), &[1, 4, 4]);
        assert!(task.val_example(2).is_err());
    }
}
