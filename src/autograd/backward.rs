//! Backward operation trait

/// A node in the backward graph.
///
/// Implementations take the gradient from their result cell, push the
/// corresponding gradients into their inputs and then recurse into the
/// inputs' ops. Taking (rather than reading) the result gradient keeps the
/// recursion linear: a node reached along two paths forwards each partial
/// gradient exactly once.
pub trait BackwardOp {
    /// Propagate the gradient of the result into the inputs
    fn backward(&self);
}
