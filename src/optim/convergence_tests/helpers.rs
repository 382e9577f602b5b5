//! Shared test helpers for optimizer convergence tests

use crate::optim::Optimizer;
use crate::Tensor;

/// Minimize f(x) = Σ x² from a fixed start; true if every coordinate ends below `threshold`
pub fn test_quadratic_convergence<O: Optimizer>(
    mut optimizer: O,
    iterations: usize,
    threshold: f32,
) -> bool {
    let mut params = vec![Tensor::from_vec(vec![3.0, -2.0, 1.5, -2.5], true)];

    for _ in 0..iterations {
        // Compute gradient: grad(x^2) = 2x
        let grad = params[0].data().mapv(|x| 2.0 * x);
        params[0].set_grad(grad);

        optimizer.step(&mut params);
    }

    params[0].data().iter().all(|&val| val.abs() < threshold)
}

/// True if f(x) = x² never increases by more than a small tolerance
pub fn test_loss_decreases<O: Optimizer>(mut optimizer: O, iterations: usize) -> bool {
    let mut params = vec![Tensor::from_vec(vec![10.0], true)];
    let mut prev_loss = f32::INFINITY;

    for _ in 0..iterations {
        let x = params[0].data()[0];
        let loss = x * x;
        if loss > prev_loss + 1e-3 {
            return false;
        }
        prev_loss = loss;

        params[0].set_grad(ndarray::arr1(&[2.0 * x]));
        optimizer.step(&mut params);
    }

    true
}

/// True if tiny gradients never produce NaN or Inf
pub fn test_small_gradient_stability<O: Optimizer>(mut optimizer: O) -> bool {
    let mut params = vec![Tensor::from_vec(vec![1e-6, 1e-6], true)];

    for _ in 0..100 {
        let grad = params[0].data().mapv(|x| 2.0 * x);
        params[0].set_grad(grad);
        optimizer.step(&mut params);
    }

    params[0].data().iter().all(|&val| val.is_finite())
}
