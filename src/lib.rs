//! # leoseg
//!
//! Few-shot image segmentation trained with latent embedding optimization.
//!
//! An outer loop meta-learns the decoder and segmentation-head weights shared
//! by every task, while an inner loop adapts a per-task latent and a
//! task-local copy of the head from a handful of labelled examples.
//!
//! ## Layout
//!
//! - [`autograd`]: tape-based reverse-mode differentiation over `ndarray`
//! - [`model`]: frozen encoder, meta-learned decoder and segmentation head
//! - [`meta`]: inner loop, finetuning loop, meta optimizer and episode driver
//! - [`optim`]: Adam and SGD
//! - [`train`]: pixel-wise loss and mean IoU
//! - [`data`]: tasks, episode batches and class splits
//! - [`io`]: checkpoint persistence with confirmed overwrites
//! - [`config`]: configuration schema, loading, validation and CLI types
//!
//! ## Example
//!
//! ```no_run
//! use leoseg::config::LeoConfig;
//! use leoseg::data::EpisodeBatch;
//! use leoseg::meta::{MetaLearner, Mode};
//!
//! # fn run(batch: EpisodeBatch) -> leoseg::Result<()> {
//! let config = LeoConfig::from_file("config.yaml")?;
//! let mut learner = MetaLearner::new(config)?;
//! let val_loss = learner.compute_loss(&batch, Mode::MetaTrain)?;
//! println!("episode loss {val_loss:.4}");
//! # Ok(())
//! # }
//! ```

pub mod autograd;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod meta;
pub mod model;
pub mod optim;
pub mod train;

pub use autograd::Tensor;
pub use error::{Error, Result};
