//! Outer loop: head finetuning and validation

use super::{first_order_grad, Mode};
use crate::autograd::{grad, Context, GradMode};
use crate::config::{Hyperparameters, ValidationSchedule};
use crate::data::Task;
use crate::model::{Encoded, FeatureEncoder, MetaParameters, SegmentationHead};
use crate::optim::{Optimizer, SGD};
use crate::train::{LossFn, MeanIoU, Metric, PixelCrossEntropy};
use crate::{Error, Result, Tensor};
use ndarray::Array1;

/// Meta-gradients contributed by one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGradients {
    /// Validation-loss gradient with respect to the task-local head weight
    pub head: Array1<f32>,
    /// Validation-loss gradients of the decoder, in parameter order
    pub decoder: Vec<Array1<f32>>,
}

/// Outcome of finetuning and validating one task
#[derive(Debug, Clone)]
pub struct FinetuneOutcome {
    pub val_loss: f32,
    pub mean_iou: f32,
    /// Present only in [`Mode::MetaTrain`]
    pub gradients: Option<TaskGradients>,
}

/// Adapts a task-local copy of the head weight, then validates it.
pub struct OuterLoopFinetuner<'a> {
    encoder: &'a FeatureEncoder,
    params: &'a MetaParameters,
    hyper: &'a Hyperparameters,
}

impl<'a> OuterLoopFinetuner<'a> {
    pub fn new(
        encoder: &'a FeatureEncoder,
        params: &'a MetaParameters,
        hyper: &'a Hyperparameters,
    ) -> Self {
        Self {
            encoder,
            params,
            hyper,
        }
    }

    /// Descent steps after the initial one, per the validation schedule
    pub fn descent_steps(&self) -> usize {
        let remaining = self.hyper.num_finetuning_steps.saturating_sub(1);
        match self.hyper.validation_schedule {
            ValidationSchedule::AfterAllSteps => remaining,
            ValidationSchedule::AfterFirstStep => remaining.min(1),
        }
    }

    /// Finetune the head on `task` starting from `features` and
    /// `initial_head_gradient`, then validate.
    ///
    /// `MetaTrain` validates the whole validation split at once and returns
    /// meta-gradients. The evaluation modes walk the split one example at a
    /// time and return means without gradients.
    pub fn finetune(
        &self,
        task: &Task,
        features: &Tensor,
        initial_head_gradient: &Array1<f32>,
        mode: Mode,
        ctx: &mut Context,
    ) -> Result<FinetuneOutcome> {
        let weight = self.adapt_weight(task, features, initial_head_gradient)?;
        if mode.is_training() {
            self.validate(task, &weight, ctx)
        } else {
            self.evaluate(task, &weight, ctx)
        }
    }

    /// `meta_weight - lr * initial_gradient`, then the scheduled descent steps
    fn adapt_weight(
        &self,
        task: &Task,
        features: &Tensor,
        initial_head_gradient: &Array1<f32>,
    ) -> Result<Tensor> {
        let meta_weight = &self.params.head_weight;
        if initial_head_gradient.len() != meta_weight.len() {
            return Err(Error::shape(
                "OuterLoopFinetuner::finetune",
                &[meta_weight.len()],
                &[initial_head_gradient.len()],
            ));
        }

        // Only the task-local weight is differentiated here.
        let features = features.detach(false);
        let mut weight = meta_weight.detach(true);
        let mut sgd = SGD::plain(self.hyper.finetuning_lr);

        weight.set_grad(initial_head_gradient.clone());
        sgd.step_refs(&mut [&mut weight]);
        weight.zero_grad();

        for step in 0..self.descent_steps() {
            let logits = SegmentationHead.classify(&features, task.train_images(), &weight)?;
            let loss = PixelCrossEntropy.forward(&logits, task.train_masks())?;
            let g = first_order_grad(&loss, &weight)?;
            weight.set_grad(g);
            sgd.step_refs(&mut [&mut weight]);
            weight.zero_grad();
            tracing::trace!(step, loss = loss.item(), "finetuning step");
        }

        Ok(weight)
    }

    fn validate(&self, task: &Task, weight: &Tensor, ctx: &mut Context) -> Result<FinetuneOutcome> {
        let images = task.val_images();
        let masks = task.val_masks();
        let Encoded { latent, skips } = self.encoder.encode(images)?;
        let (_, logits) =
            self.params
                .forward(&latent, &skips, images, weight, self.hyper.dropout_rate, ctx)?;
        let loss = PixelCrossEntropy.forward(&logits, masks)?;

        let mut inputs = vec![weight];
        inputs.extend(self.params.decoder.parameters());
        let mut grads = grad(&loss, &inputs, GradMode::first_order())?.into_iter();
        let head = grads
            .next()
            .ok_or_else(|| Error::Unsupported("missing head gradient".to_string()))?;

        Ok(FinetuneOutcome {
            val_loss: loss.item(),
            mean_iou: MeanIoU.compute(&logits, masks)?,
            gradients: Some(TaskGradients {
                head,
                decoder: grads.collect(),
            }),
        })
    }

    fn evaluate(&self, task: &Task, weight: &Tensor, ctx: &mut Context) -> Result<FinetuneOutcome> {
        let weight = weight.detach(false);
        let count = task.num_val();
        let mut total_loss = 0.0;
        let mut total_iou = 0.0;

        for index in 0..count {
            let (image, mask) = task.val_example(index)?;
            let Encoded { latent, skips } = self.encoder.encode(&image)?;
            let (_, logits) =
                self.params
                    .forward(&latent, &skips, &image, &weight, self.hyper.dropout_rate, ctx)?;
            total_loss += PixelCrossEntropy.forward(&logits, &mask)?.item();
            total_iou += MeanIoU.compute(&logits, &mask)?;
        }

        Ok(FinetuneOutcome {
            val_loss: total_loss / count as f32,
            mean_iou: total_iou / count as f32,
            gradients: None,
        })
    }
}
