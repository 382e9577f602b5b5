//! Inner loop: latent adaptation

use super::first_order_grad;
use crate::autograd::Context;
use crate::model::{Encoded, FeatureEncoder, MetaParameters};
use crate::optim::{Optimizer, SGD};
use crate::train::{LossFn, PixelCrossEntropy};
use crate::{Result, Tensor};
use ndarray::Array1;

/// Result of adapting one task's latent
#[derive(Debug, Clone)]
pub struct Adaptation {
    /// Gradient of the final training loss with respect to the meta head weight
    pub head_gradient: Array1<f32>,
    /// Decoded features of the final forward pass
    pub features: Tensor,
    /// Final training loss
    pub train_loss: f32,
}

/// Specializes the latent to a task while every weight stays fixed.
pub struct InnerLoopAdapter<'a> {
    encoder: &'a FeatureEncoder,
    params: &'a MetaParameters,
    dropout_rate: f32,
}

impl<'a> InnerLoopAdapter<'a> {
    pub fn new(encoder: &'a FeatureEncoder, params: &'a MetaParameters, dropout_rate: f32) -> Self {
        Self {
            encoder,
            params,
            dropout_rate,
        }
    }

    /// Run `steps` descent steps of size `lr` on the latent of `image`.
    ///
    /// Each step differentiates the training loss with respect to the latent
    /// only, updates it, and re-runs the decoder and head. With `steps == 0`
    /// the head gradient comes straight from the initial forward pass.
    pub fn adapt_latent(
        &self,
        image: &Tensor,
        mask: &Tensor,
        steps: usize,
        lr: f32,
        ctx: &mut Context,
    ) -> Result<Adaptation> {
        let Encoded { mut latent, skips } = self.encoder.encode(image)?;
        let head_weight = &self.params.head_weight;

        let (mut features, logits) =
            self.params
                .forward(&latent, &skips, image, head_weight, self.dropout_rate, ctx)?;
        let mut loss = PixelCrossEntropy.forward(&logits, mask)?;

        let mut sgd = SGD::plain(lr);
        for step in 0..steps {
            let latent_grad = first_order_grad(&loss, &latent)?;
            let mut next = latent.detach(true);
            next.set_grad(latent_grad);
            sgd.step_refs(&mut [&mut next]);
            next.zero_grad();
            latent = next;

            let (next_features, logits) =
                self.params
                    .forward(&latent, &skips, image, head_weight, self.dropout_rate, ctx)?;
            features = next_features;
            loss = PixelCrossEntropy.forward(&logits, mask)?;
            tracing::trace!(step, loss = loss.item(), "latent step");
        }

        let head_gradient = first_order_grad(&loss, head_weight)?;
        Ok(Adaptation {
            head_gradient,
            features,
            train_loss: loss.item(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{grad, GradMode};

    fn sample(seed: f32) -> (Tensor, Tensor) {
        let image: Vec<f32> = (0..3 * 32 * 32).map(|i| ((i as f32 + seed) * 0.13).sin()).collect();
        let mask: Vec<f32> = (0..32 * 32).map(|i| f32::from(u8::from(i % 32 < 12))).collect();
        (
            Tensor::from_shape(&[1, 3, 32, 32], image, false).unwrap(),
            Tensor::from_shape(&[1, 32, 32], mask, false).unwrap(),
        )
    }

    #[test]
    fn test_zero_steps_matches_direct_gradient() {
        let encoder = FeatureEncoder::new(0);
        let params = MetaParameters::new(0);
        let (image, mask) = sample(0.0);

        let adapter = InnerLoopAdapter::new(&encoder, &params, 0.0);
        let adapted = adapter
            .adapt_latent(&image, &mask, 0, 0.1, &mut Context::with_seed(0))
            .unwrap();

        let Encoded { latent, skips } = encoder.encode(&image).unwrap();
        let (_, logits) = params
            .forward(&latent, &skips, &image, &params.head_weight, 0.0, &mut Context::with_seed(0))
            .unwrap();
        let loss = PixelCrossEntropy.forward(&logits, &mask).unwrap();
        let direct = grad(&loss, &[&params.head_weight], GradMode::first_order()).unwrap();

        assert_eq!(adapted.head_gradient, direct[0]);
        assert!((adapted.train_loss - loss.item()).abs() < 1e-6);
    }

    #[test]
    fn test_adaptation_leaves_meta_weights_untouched() {
        let encoder = FeatureEncoder::new(1);
        let params = MetaParameters::new(1);
        let before = params.head_weight.data().clone();
        let (image, mask) = sample(1.0);

        let adapted = InnerLoopAdapter::new(&encoder, &params, 0.0)
            .adapt_latent(&image, &mask, 2, 0.5, &mut Context::with_seed(0))
            .unwrap();

        assert_eq!(params.head_weight.data(), &before);
        assert_eq!(adapted.features.shape(), &[1, 48, 32, 32]);
        assert_eq!(adapted.head_gradient.len(), params.head_weight.len());
        assert!(adapted.train_loss.is_finite());
    }

    #[test]
    fn test_zero_learning_rate_keeps_initial_loss() {
        let encoder = FeatureEncoder::new(2);
        let params = MetaParameters::new(2);
        let (image, mask) = sample(2.0);
        let adapter = InnerLoopAdapter::new(&encoder, &params, 0.0);

        let none = adapter
            .adapt_latent(&image, &mask, 0, 0.0, &mut Context::with_seed(0))
            .unwrap();
        let frozen = adapter
            .adapt_latent(&image, &mask, 3, 0.0, &mut Context::with_seed(0))
            .unwrap();
        assert!((none.train_loss - frozen.train_loss).abs() < 1e-6);
    }
}
