//! Few-shot tasks, episode batches and class splits

mod batch;
mod split;
mod task;

pub use batch::{nhwc_to_nchw, EpisodeBatch};
pub use split::{split_meta_classes, MetaClassSplit};
pub use task::Task;
