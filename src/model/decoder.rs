//! Multi-scale decoder with skip fusion

use super::{he_uniform, DECODER_BASE, LATENT_CHANNELS, SKIP_CHANNELS};
use crate::autograd::{
    batch_norm2d, concat_channels, conv2d, conv_transpose2d, dropout, relu, Context, Conv2dSpec,
};
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use std::collections::HashMap;

const UP_SPEC: Conv2dSpec = Conv2dSpec::new(4, 2, 1);
const BLOCK_SPEC: Conv2dSpec = Conv2dSpec::new(3, 1, 1);
const BN_EPSILON: f32 = 1e-5;

/// Channel bookkeeping of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StageLayout {
    input: usize,
    upsampled: usize,
    skip: usize,
}

impl StageLayout {
    fn fused(&self) -> usize {
        self.upsampled + self.skip
    }
}

/// Stage `i` upsamples to `DECODER_BASE * (i + 1)` channels and fuses the
/// skips deepest-first.
fn layout() -> [StageLayout; 4] {
    let mut input = LATENT_CHANNELS;
    std::array::from_fn(|i| {
        let stage = StageLayout {
            input,
            upsampled: DECODER_BASE * (i + 1),
            skip: SKIP_CHANNELS[SKIP_CHANNELS.len() - 1 - i],
        };
        input = stage.fused();
        stage
    })
}

/// Upsampling convolution followed by skip fusion and a conv block.
#[derive(Debug, Clone)]
pub struct DecoderStage {
    /// Transposed convolution `[input, upsampled, 4, 4]`
    pub up_weight: Tensor,
    pub up_bias: Tensor,
    /// Block convolution `[fused, fused, 3, 3]`
    pub conv_weight: Tensor,
    pub conv_bias: Tensor,
    /// Batch norm scale
    pub bn_gamma: Tensor,
    /// Batch norm shift
    pub bn_beta: Tensor,
}

impl DecoderStage {
    fn new(layout: StageLayout, rng: &mut StdRng) -> Self {
        let k = UP_SPEC.kernel;
        let b = BLOCK_SPEC.kernel;
        let fused = layout.fused();
        Self {
            up_weight: he_uniform(
                &[layout.input, layout.upsampled, k, k],
                layout.upsampled * k * k,
                rng,
                true,
            ),
            up_bias: Tensor::zeros(&[layout.upsampled], true),
            conv_weight: he_uniform(&[fused, fused, b, b], fused * b * b, rng, true),
            conv_bias: Tensor::zeros(&[fused], true),
            bn_gamma: Tensor::from_vec(vec![1.0; fused], true),
            bn_beta: Tensor::zeros(&[fused], true),
        }
    }

    /// upsample → concat(skip) → conv3x3 → ReLU → Dropout → BatchNorm → ReLU
    fn forward(&self, x: &Tensor, skip: &Tensor, dropout_rate: f32, ctx: &mut Context) -> Result<Tensor> {
        let up = conv_transpose2d(x, &self.up_weight, Some(&self.up_bias), UP_SPEC)?;
        let fused = concat_channels(&up, skip)?;
        let h = relu(&conv2d(&fused, &self.conv_weight, Some(&self.conv_bias), BLOCK_SPEC)?);
        let h = dropout(&h, dropout_rate, ctx);
        let h = batch_norm2d(&h, &self.bn_gamma, &self.bn_beta, BN_EPSILON)?;
        Ok(relu(&h))
    }

    fn parameters(&self) -> [&Tensor; 6] {
        [
            &self.up_weight,
            &self.up_bias,
            &self.conv_weight,
            &self.conv_bias,
            &self.bn_gamma,
            &self.bn_beta,
        ]
    }

    fn parameters_mut(&mut self) -> [&mut Tensor; 6] {
        [
            &mut self.up_weight,
            &mut self.up_bias,
            &mut self.conv_weight,
            &mut self.conv_bias,
            &mut self.bn_gamma,
            &mut self.bn_beta,
        ]
    }
}

const STAGE_PARAM_NAMES: [&str; 6] = [
    "up.weight",
    "up.bias",
    "conv.weight",
    "conv.bias",
    "bn.weight",
    "bn.bias",
];

/// Decoder turning the latent back into full-resolution features.
///
/// Meta-learned: every tensor here requires gradients and is updated by
/// the meta optimizer.
#[derive(Debug, Clone)]
pub struct FeatureDecoder {
    stages: Vec<DecoderStage>,
    final_weight: Tensor,
    final_bias: Tensor,
}

impl FeatureDecoder {
    /// Initialize all stages from `rng`
    pub fn new(rng: &mut StdRng) -> Self {
        let stages: Vec<DecoderStage> = layout().into_iter().map(|l| DecoderStage::new(l, rng)).collect();
        let channels = Self::output_channels();
        let k = UP_SPEC.kernel;
        Self {
            stages,
            final_weight: he_uniform(&[channels, channels, k, k], channels * k * k, rng, true),
            final_bias: Tensor::zeros(&[channels], true),
        }
    }

    /// Channels of the decoded feature map
    pub fn output_channels() -> usize {
        layout()[3].fused()
    }

    /// Parameter names and shapes in [`FeatureDecoder::parameters`] order
    pub fn parameter_shapes() -> Vec<(String, Vec<usize>)> {
        let (k, b) = (UP_SPEC.kernel, BLOCK_SPEC.kernel);
        let mut shapes = Vec::new();
        for (i, l) in layout().iter().enumerate() {
            let fused = l.fused();
            let stage_shapes = [
                vec![l.input, l.upsampled, k, k],
                vec![l.upsampled],
                vec![fused, fused, b, b],
                vec![fused],
                vec![fused],
                vec![fused],
            ];
            for (name, shape) in STAGE_PARAM_NAMES.iter().zip(stage_shapes) {
                shapes.push((format!("decoder.stage{}.{name}", i + 1), shape));
            }
        }
        let c = Self::output_channels();
        shapes.push(("decoder.final.weight".to_string(), vec![c, c, k, k]));
        shapes.push(("decoder.final.bias".to_string(), vec![c]));
        shapes
    }

    /// Rebuild a decoder from named parameters, checking every shape.
    pub fn from_params(params: &HashMap<String, Tensor>) -> Result<Self> {
        let mut tensors = Self::parameter_shapes()
            .into_iter()
            .map(|(name, shape)| {
                let tensor = params
                    .get(&name)
                    .ok_or_else(|| Error::Serialization(format!("missing decoder parameter {name}")))?;
                if tensor.shape() != shape.as_slice() {
                    return Err(Error::shape("FeatureDecoder::from_params", &shape, tensor.shape()));
                }
                Ok(tensor.detach(true))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        let mut next = || {
            tensors
                .next()
                .ok_or_else(|| Error::Serialization("decoder parameter list too short".to_string()))
        };
        let mut stages = Vec::with_capacity(4);
        for _ in 0..4 {
            stages.push(DecoderStage {
                up_weight: next()?,
                up_bias: next()?,
                conv_weight: next()?,
                conv_bias: next()?,
                bn_gamma: next()?,
                bn_beta: next()?,
            });
        }
        let final_weight = next()?;
        let final_bias = next()?;

        Ok(Self {
            stages,
            final_weight,
            final_bias,
        })
    }

    /// Decode `latent` fusing `skips` (given shallow to deep, consumed deepest-first).
    pub fn decode(
        &self,
        latent: &Tensor,
        skips: &[Tensor; 4],
        dropout_rate: f32,
        ctx: &mut Context,
    ) -> Result<Tensor> {
        let mut x = latent.clone();
        for (stage, skip) in self.stages.iter().zip(skips.iter().rev()) {
            x = stage.forward(&x, skip, dropout_rate, ctx)?;
        }
        conv_transpose2d(&x, &self.final_weight, Some(&self.final_bias), UP_SPEC)
    }

    /// Get all parameters as a vector
    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params: Vec<&Tensor> = self.stages.iter().flat_map(DecoderStage::parameters).collect();
        params.push(&self.final_weight);
        params.push(&self.final_bias);
        params
    }

    /// Get all parameters as mutable references for optimizer
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params: Vec<&mut Tensor> = self
            .stages
            .iter_mut()
            .flat_map(DecoderStage::parameters_mut)
            .collect();
        params.push(&mut self.final_weight);
        params.push(&mut self.final_bias);
        params
    }

    /// Parameters paired with their checkpoint names
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        Self::parameter_shapes()
            .into_iter()
            .map(|(name, _)| name)
            .zip(self.parameters())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn skips(n: usize, size: usize) -> [Tensor; 4] {
        std::array::from_fn(|i| {
            let side = size >> (i + 1);
            Tensor::from_vec(vec![0.5; n * SKIP_CHANNELS[i] * side * side], false)
                .reshape(&[n, SKIP_CHANNELS[i], side, side])
                .unwrap()
        })
    }

    #[test]
    fn test_layout_channels() {
        let l = layout();
        assert_eq!(l.map(|s| s.fused()), [104, 48, 48, 48]);
        assert_eq!(l.map(|s| s.input), [1280, 104, 48, 48]);
        assert_eq!(FeatureDecoder::output_channels(), 48);
    }

    #[test]
    fn test_decode_restores_resolution() {
        let decoder = FeatureDecoder::new(&mut StdRng::seed_from_u64(0));
        let latent = Tensor::from_vec(vec![0.1; 2 * LATENT_CHANNELS], true)
            .reshape(&[2, LATENT_CHANNELS, 1, 1])
            .unwrap();
        let mut ctx = Context::with_seed(0);
        let out = decoder.decode(&latent, &skips(2, 32), 0.3, &mut ctx).unwrap();
        assert_eq!(out.shape(), &[2, 48, 32, 32]);
        assert!(out.requires_grad());
    }

    #[test]
    fn test_parameter_lists_agree() {
        let decoder = FeatureDecoder::new(&mut StdRng::seed_from_u64(0));
        let shapes = FeatureDecoder::parameter_shapes();
        let params = decoder.parameters();
        assert_eq!(shapes.len(), 26);
        assert_eq!(params.len(), shapes.len());
        for ((name, shape), param) in shapes.iter().zip(&params) {
            assert_eq!(param.shape(), shape.as_slice(), "{name}");
            assert!(param.requires_grad());
        }
        assert_eq!(decoder.named_parameters()[0].0, "decoder.stage1.up.weight");
    }

    #[test]
    fn test_from_params_round_trip() {
        let decoder = FeatureDecoder::new(&mut StdRng::seed_from_u64(4));
        let map: HashMap<String, Tensor> = decoder
            .named_parameters()
            .into_iter()
            .map(|(name, t)| (name, t.clone()))
            .collect();
        let rebuilt = FeatureDecoder::from_params(&map).unwrap();
        for (a, b) in decoder.parameters().iter().zip(rebuilt.parameters()) {
            assert_eq!(a.data(), b.data());
        }
    }

    #[test]
    fn test_from_params_rejects_wrong_shape() {
        let decoder = FeatureDecoder::new(&mut StdRng::seed_from_u64(4));
        let mut map: HashMap<String, Tensor> = decoder
            .named_parameters()
            .into_iter()
            .map(|(name, t)| (name, t.clone()))
            .collect();
        map.insert("decoder.final.bias".to_string(), Tensor::zeros(&[3], true));
        assert!(matches!(
            FeatureDecoder::from_params(&map),
            Err(Error::Shape { .. })
        ));

        map.remove("decoder.stage2.bn.weight");
        assert!(matches!(
            FeatureDecoder::from_params(&map),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_skip_mismatch_is_shape_error() {
        let decoder = FeatureDecoder::new(&mut StdRng::seed_from_u64(0));
        let latent = Tensor::zeros(&[1, LATENT_CHANNELS, 1, 1], true);
        let mut ctx = Context::with_seed(0);
        // skips sized for a 64px image while the latent matches 32px
        assert!(decoder.decode(&latent, &skips(1, 64), 0.0, &mut ctx).is_err());
    }
}
