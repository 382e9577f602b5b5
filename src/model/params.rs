//! Meta-parameters shared across tasks

use super::{FeatureDecoder, SegmentationHead};
use crate::autograd::Context;
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// Decoder weights and segmentation-head weight.
///
/// Read by every task of an episode; only the meta optimizer writes them.
#[derive(Debug, Clone)]
pub struct MetaParameters {
    pub decoder: FeatureDecoder,
    pub head_weight: Tensor,
}

impl MetaParameters {
    /// Checkpoint name of the head weight
    pub const HEAD_WEIGHT: &'static str = "head.weight";

    /// Fresh parameters drawn from `seed`
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
        let decoder = FeatureDecoder::new(&mut rng);
        let head_weight = SegmentationHead::init_weight(&mut rng);
        Self {
            decoder,
            head_weight,
        }
    }

    /// Decode `latent` and classify with `weight`; returns `(features, logits)`.
    pub fn forward(
        &self,
        latent: &Tensor,
        skips: &[Tensor; 4],
        image: &Tensor,
        weight: &Tensor,
        dropout_rate: f32,
        ctx: &mut Context,
    ) -> Result<(Tensor, Tensor)> {
        let features = self.decoder.decode(latent, skips, dropout_rate, ctx)?;
        let logits = SegmentationHead.classify(&features, image, weight)?;
        Ok((features, logits))
    }

    /// Decoder parameters followed by the head weight
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        let mut params = self.decoder.named_parameters();
        params.push((Self::HEAD_WEIGHT.to_string(), &self.head_weight));
        params
    }

    /// Rebuild from named tensors, validating names and shapes
    pub fn from_named(params: Vec<(String, Tensor)>) -> Result<Self> {
        let mut map: HashMap<String, Tensor> = params.into_iter().collect();
        let head_weight = map
            .remove(Self::HEAD_WEIGHT)
            .ok_or_else(|| Error::Serialization(format!("missing parameter {}", Self::HEAD_WEIGHT)))?;
        let expected = SegmentationHead::weight_shape();
        if head_weight.shape() != expected {
            return Err(Error::shape("MetaParameters::from_named", &expected, head_weight.shape()));
        }

        Ok(Self {
            decoder: FeatureDecoder::from_params(&map)?,
            head_weight: head_weight.detach(true),
        })
    }

    /// Total number of scalar parameters
    pub fn num_parameters(&self) -> usize {
        self.named_parameters().iter().map(|(_, t)| t.len()).sum()
    }

    /// Clear every gradient slot
    pub fn zero_grad(&self) {
        for param in self.decoder.parameters() {
            param.zero_grad();
        }
        self.head_weight.zero_grad();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LATENT_CHANNELS;

    #[test]
    fn test_seeded_construction() {
        let a = MetaParameters::new(3);
        let b = MetaParameters::new(3);
        assert_eq!(a.head_weight.data(), b.head_weight.data());
        assert_ne!(a.head_weight.data(), MetaParameters::new(4).head_weight.data());
    }

    #[test]
    fn test_named_round_trip() {
        let params = MetaParameters::new(0);
        let named: Vec<(String, Tensor)> = params
            .named_parameters()
            .into_iter()
            .map(|(n, t)| (n, t.clone()))
            .collect();
        assert_eq!(named.last().map(|(n, _)| n.as_str()), Some("head.weight"));

        let back = MetaParameters::from_named(named).unwrap();
        assert_eq!(back.head_weight.data(), params.head_weight.data());
        assert_eq!(back.num_parameters(), params.num_parameters());
    }

    #[test]
    fn test_missing_head_weight() {
        let named: Vec<(String, Tensor)> = MetaParameters::new(0)
            .decoder
            .named_parameters()
            .into_iter()
            .map(|(n, t)| (n, t.clone()))
            .collect();
        assert!(matches!(
            MetaParameters::from_named(named),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_forward_produces_logits() {
        let params = MetaParameters::new(0);
        let latent = Tensor::zeros(&[1, LATENT_CHANNELS, 1, 1], true);
        let skips: [Tensor; 4] = std::array::from_fn(|i| {
            let c = crate::model::SKIP_CHANNELS[i];
            let side = 16 >> i;
            Tensor::zeros(&[1, c, side, side], false)
        });
        let image = Tensor::zeros(&[1, 3, 32, 32], false);
        let mut ctx = Context::with_seed(0);
        let (features, logits) = params
            .forward(&latent, &skips, &image, &params.head_weight, 0.0, &mut ctx)
            .unwrap();
        assert_eq!(features.shape(), &[1, 48, 32, 32]);
        assert_eq!(logits.shape(), &[1, 2, 32, 32]);
    }

    #[test]
    fn test_zero_grad_clears_slots() {
        let params = MetaParameters::new(0);
        params.head_weight.set_grad(ndarray::Array1::ones(params.head_weight.len()));
        params.zero_grad();
        assert!(params
            .head_weight
            .grad()
            .is_none_or(|g| g.iter().all(|&v| v == 0.0)));
    }
}
