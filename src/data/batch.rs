//! Episode batches

use super::Task;
use crate::{Error, Result, Tensor};
use ndarray::Array4;

/// Ordered tasks that contribute to one meta update.
#[derive(Debug, Clone)]
pub struct EpisodeBatch {
    tasks: Vec<Task>,
}

impl EpisodeBatch {
    /// Bundle already-validated tasks; at least one is required
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(Error::InvalidTask("episode batch has no tasks".to_string()));
        }
        Ok(Self { tasks })
    }

    /// Build a batch from per-task NHWC arrays.
    ///
    /// Entry `i` of every slice belongs to task `i`. Images are
    /// `[examples, height, width, channels]`, masks the same with one channel.
    pub fn from_nhwc(
        train_images: &[Array4<f32>],
        train_masks: &[Array4<f32>],
        val_images: &[Array4<f32>],
        val_masks: &[Array4<f32>],
        classes: &[String],
    ) -> Result<Self> {
        let n = classes.len();
        let lens = [
            train_images.len(),
            train_masks.len(),
            val_images.len(),
            val_masks.len(),
        ];
        if lens.iter().any(|&len| len != n) {
            return Err(Error::InvalidTask(format!(
                "batch fields disagree on the number of tasks: {lens:?} vs {n} classes"
            )));
        }

        let tasks = (0..n)
            .map(|i| {
                Task::new(
                    nhwc_to_nchw(&train_images[i])?,
                    nhwc_to_nchw(&train_masks[i])?,
                    nhwc_to_nchw(&val_images[i])?,
                    nhwc_to_nchw(&val_masks[i])?,
                    classes[i].clone(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// One-line description of the batch geometry
    pub fn shape_summary(&self) -> String {
        let first = &self.tasks[0];
        format!(
            "tr_data shape: {:?}, tr_data_masks shape: {:?}, val_data shape: {:?}, val_masks shape: {:?}, num tasks: {}",
            first.train_images().shape(),
            first.train_masks().shape(),
            first.val_images().shape(),
            first.val_masks().shape(),
            self.len()
        )
    }
}

/// Permute `[N, H, W, C]` into a `[N, C, H, W]` tensor.
pub fn nhwc_to_nchw(array: &Array4<f32>) -> Result<Tensor> {
    let (n, h, w, c) = array.dim();
    let data: Vec<f32> = array.view().permuted_axes([0, 3, 1, 2]).iter().copied().collect();
    Tensor::from_shape(&[n, c, h, w], data, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nhwc(n: usize, h: usize, w: usize, c: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, h, w, c), |(i, y, x, k)| (i * 1000 + y * 100 + x * 10 + k) as f32)
    }

    #[test]
    fn test_nhwc_to_nchw_moves_channels() {
        let t = nhwc_to_nchw(&nhwc(1, 2, 2, 3)).unwrap();
        assert_eq!(t.shape(), &[1, 3, 2, 2]);
        // channel 1 plane: (y, x) → y*100 + x*10 + 1
        assert_eq!(t.data().to_vec()[4..8], [1.0, 11.0, 101.0, 111.0]);
    }

    #[test]
    fn test_from_nhwc_builds_tasks() {
        let batch = EpisodeBatch::from_nhwc(
            &[nhwc(2, 4, 4, 3), nhwc(2, 4, 4, 3)],
            &[Array4::zeros((2, 4, 4, 1)), Array4::zeros((2, 4, 4, 1))],
            &[nhwc(1, 4, 4, 3), nhwc(1, 4, 4, 3)],
            &[Array4::zeros((1, 4, 4, 1)), Array4::zeros((1, 4, 4, 1))],
            &["cat".to_string(), "dog".to_string()],
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.tasks()[1].class_name(), "dog");
        assert_eq!(batch.tasks()[0].train_images().shape(), &[2, 3, 4, 4]);
        assert_eq!(batch.tasks()[0].train_masks().shape(), &[2, 4, 4]);
        assert!(batch.shape_summary().contains("num tasks: 2"));
    }

    #[test]
    fn test_from_nhwc_field_count_mismatch() {
        let result = EpisodeBatch::from_nhwc(
            &[nhwc(1, 4, 4, 3)],
            &[],
            &[nhwc(1, 4, 4, 3)],
            &[Array4::zeros((1, 4, 4, 1))],
            &["cat".to_string()],
        );
        assert!(matches!(result, Err(Error::InvalidTask(_))));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(EpisodeBatch::new(Vec::new()).is_err());
    }
}
