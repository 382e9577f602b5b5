//! Property-based tests for convolution, batch norm and concatenation

use super::test_utils::{assert_grad_close, finite_difference};
use crate::autograd::{
    backward, batch_norm2d, concat_channels, conv2d, conv_transpose2d, sum, Conv2dSpec, Tensor,
};
use proptest::prelude::*;

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_conv_transpose_is_adjoint(
        x in prop::collection::vec(-1.0f32..1.0, 2 * 8 * 8),
        w in prop::collection::vec(-1.0f32..1.0, 3 * 2 * 4 * 4),
        y in prop::collection::vec(-1.0f32..1.0, 3 * 4 * 4),
    ) {
        let spec = Conv2dSpec::new(4, 2, 1);
        let tx = Tensor::from_shape(&[1, 2, 8, 8], x.clone(), false).unwrap();
        let tw = Tensor::from_shape(&[3, 2, 4, 4], w, false).unwrap();
        let ty = Tensor::from_shape(&[1, 3, 4, 4], y.clone(), false).unwrap();

        let forward = conv2d(&tx, &tw, None, spec).unwrap();
        let adjoint = conv_transpose2d(&ty, &tw, None, spec).unwrap();

        let lhs = dot(forward.data().as_slice().unwrap(), &y);
        let rhs = dot(adjoint.data().as_slice().unwrap(), &x);
        prop_assert!((lhs - rhs).abs() < 1e-3 * (1.0 + lhs.abs()), "lhs={} rhs={}", lhs, rhs);
    }

    #[test]
    fn prop_conv2d_weight_gradient_check(
        x in prop::collection::vec(-1.0f32..1.0, 2 * 4 * 4),
        w in prop::collection::vec(-1.0f32..1.0, 2 * 2 * 3 * 3),
    ) {
        let spec = Conv2dSpec::new(3, 1, 1);
        let tx = Tensor::from_shape(&[1, 2, 4, 4], x.clone(), false).unwrap();
        let tw = Tensor::from_shape(&[2, 2, 3, 3], w.clone(), true).unwrap();
        let mut loss = sum(&conv2d(&tx, &tw, None, spec).unwrap());
        backward(&mut loss, None);

        let numerical = finite_difference(
            |w_val| {
                let tw = Tensor::from_shape(&[2, 2, 3, 3], w_val.to_vec(), false).unwrap();
                sum(&conv2d(&tx, &tw, None, spec).unwrap()).item()
            },
            &w,
            1e-2,
        );
        assert_grad_close(&tw.grad().unwrap().to_vec(), &numerical, 1e-2);
    }

    #[test]
    fn prop_batch_norm_gradient_sums_to_zero(
        x in prop::collection::vec(-3.0f32..3.0, 2 * 2 * 3 * 3),
        r in prop::collection::vec(-1.0f32..1.0, 2 * 2 * 3 * 3),
    ) {
        // Shifting a channel by a constant leaves its output unchanged
        let tx = Tensor::from_shape(&[2, 2, 3, 3], x, true).unwrap();
        let gamma = Tensor::from_vec(vec![1.0, 2.0], false);
        let beta = Tensor::from_vec(vec![0.0, 0.5], false);
        let weights = Tensor::from_shape(&[2, 2, 3, 3], r, false).unwrap();

        let out = batch_norm2d(&tx, &gamma, &beta, 1e-3).unwrap();
        let mut loss = sum(&crate::autograd::mul(&out, &weights).unwrap());
        backward(&mut loss, None);

        let g = tx.grad().unwrap();
        for ch in 0..2 {
            let total: f32 = (0..2)
                .flat_map(|n| {
                    let start = (n * 2 + ch) * 9;
                    start..start + 9
                })
                .map(|i| g[i])
                .sum();
            prop_assert!(total.abs() < 1e-2, "channel {} gradient sum {}", ch, total);
        }
    }

    #[test]
    fn prop_concat_preserves_elements(
        a in prop::collection::vec(-5.0f32..5.0, 2 * 3 * 4),
        b in prop::collection::vec(-5.0f32..5.0, 2 * 1 * 4),
    ) {
        let ta = Tensor::from_shape(&[2, 3, 2, 2], a.clone(), false).unwrap();
        let tb = Tensor::from_shape(&[2, 1, 2, 2], b.clone(), false).unwrap();
        let c = concat_channels(&ta, &tb).unwrap();

        prop_assert_eq!(c.shape(), &[2, 4, 2, 2]);
        let total: f32 = c.data().sum();
        let expected: f32 = a.iter().sum::<f32>() + b.iter().sum::<f32>();
        prop_assert!((total - expected).abs() < 1e-3);
    }
}
