//! Optimizer trait

use crate::Tensor;

/// Trait for optimization algorithms
///
/// Parameters are updated in place from their gradient slots. A parameter
/// with no gradient is left untouched but keeps its position, so per-parameter
/// state stays aligned across steps.
pub trait Optimizer {
    /// Perform optimization step on referenced parameters
    ///
    /// This is the form used when parameters are borrowed from a model
    fn step_refs(&mut self, params: &mut [&mut Tensor]);

    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]) {
        let mut refs: Vec<&mut Tensor> = params.iter_mut().collect();
        self.step_refs(&mut refs);
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
