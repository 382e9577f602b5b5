//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {name}: {value} (must be > 0.0 and <= 1.0)")]
    InvalidLearningRate { name: &'static str, value: f32 },

    #[error("Invalid inner_loop_lr: {0} (must be >= 0.0)")]
    InvalidInnerLoopLr(f32),

    #[error("Invalid num_finetuning_steps: {0} (must be >= 1)")]
    InvalidFinetuningSteps(usize),

    #[error("Invalid dropout_rate: {0} (must be in [0.0, 1.0))")]
    InvalidDropout(f32),

    #[error("Unsupported dtype: {0} (only float32 is supported)")]
    UnsupportedDtype(String),

    #[error("Invalid display_stats_interval: {0} (must be > 0)")]
    InvalidDisplayInterval(u64),

    #[error("Invalid experiment.episode: {0} (must be -1 for the latest or a checkpoint number)")]
    InvalidEpisode(i64),

    #[error("Invalid meta_train_val_test_ratio: {0:?} (at least one class must go to meta_train)")]
    InvalidRatio([usize; 3]),
}

impl From<ValidationError> for crate::Error {
    fn from(e: ValidationError) -> Self {
        crate::Error::Config(format!("Invalid config: {e}"))
    }
}
