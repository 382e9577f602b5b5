//! Optimizers for meta-parameters and task-local adaptation
//!
//! [`Adam`] applies the once-per-episode meta update; [`SGD`] is the plain
//! descent step used by the inner and finetuning loops.

mod adam;
#[cfg(test)]
mod convergence_tests;
mod optimizer;
mod sgd;

pub use adam::{Adam, AdamState};
pub use optimizer::Optimizer;
pub use sgd::SGD;
