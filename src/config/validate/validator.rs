//! Configuration validation logic

use super::error::ValidationError;
use crate::config::schema::{EpisodeSelector, LeoConfig};

/// Validate an experiment configuration
///
/// Checks:
/// - learning rates and dropout are in range
/// - step counts and intervals are usable
/// - dtype and the resume episode are recognised
pub fn validate_config(config: &LeoConfig) -> Result<(), ValidationError> {
    let hp = &config.hyperparameters;

    for (name, value) in [
        ("outer_loop_lr", hp.outer_loop_lr),
        ("finetuning_lr", hp.finetuning_lr),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(ValidationError::InvalidLearningRate { name, value });
        }
    }

    // Zero disables latent adaptation; the step count can do the same.
    if !hp.inner_loop_lr.is_finite() || hp.inner_loop_lr < 0.0 {
        return Err(ValidationError::InvalidInnerLoopLr(hp.inner_loop_lr));
    }

    if hp.num_finetuning_steps == 0 {
        return Err(ValidationError::InvalidFinetuningSteps(hp.num_finetuning_steps));
    }

    if !(0.0..1.0).contains(&hp.dropout_rate) {
        return Err(ValidationError::InvalidDropout(hp.dropout_rate));
    }

    if config.dtype != "float32" {
        return Err(ValidationError::UnsupportedDtype(config.dtype.clone()));
    }

    if config.display_stats_interval == 0 {
        return Err(ValidationError::InvalidDisplayInterval(config.display_stats_interval));
    }

    if EpisodeSelector::from_config(config.experiment.episode).is_none() {
        return Err(ValidationError::InvalidEpisode(config.experiment.episode));
    }

    if let Some(ratio) = config.data_params.meta_train_val_test_ratio {
        if ratio[0] == 0 {
            return Err(ValidationError::InvalidRatio(ratio));
        }
    }

    Ok(())
}
