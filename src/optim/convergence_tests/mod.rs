//! Property-based convergence tests for optimizers
//!
//! - `sgd_tests` - plain SGD
//! - `adam_tests` - Adam, including a resume from a state snapshot

mod helpers;
