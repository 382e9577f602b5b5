//! Execution context for forward passes

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Context threaded through forward passes.
///
/// Carries the train/eval switch (dropout is only active while training) and
/// the seeded generator dropout masks are drawn from.
pub struct Context {
    training: bool,
    seed: u64,
    rng: StdRng,
}

impl Context {
    /// Create a new context in training mode
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a training context with a fixed dropout seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            training: true,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Set training mode
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Set evaluation mode
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Check if in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Seed the context was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generator for stochastic ops
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_context_new() {
        let ctx = Context::new();
        assert!(ctx.is_training());
        assert_eq!(ctx.seed(), 0);
    }

    #[test]
    fn test_context_train_mode() {
        let mut ctx = Context::new();
        ctx.eval();
        assert!(!ctx.is_training());

        ctx.train();
        assert!(ctx.is_training());
    }

    #[test]
    fn test_context_seeded_rng_repeats() {
        let mut a = Context::with_seed(7);
        let mut b = Context::with_seed(7);
        let xa: f32 = a.rng().random();
        let xb: f32 = b.rng().random();
        assert_eq!(xa, xb);
    }
}
