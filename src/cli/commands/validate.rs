//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, LeoConfig, ValidateArgs};

/// Format run-level settings as a string
pub fn format_run_info(config: &LeoConfig) -> String {
    format!(
        "  Data path: {}\n  Seed: {}\n  Dtype: {}\n  GPU requested: {}\n  Stats interval: {}",
        config.data_path.display(),
        config.seed,
        config.dtype,
        config.use_gpu,
        config.display_stats_interval
    )
}

/// Format hyperparameters as a string
pub fn format_hyperparameters(config: &LeoConfig) -> String {
    let h = &config.hyperparameters;
    [
        format!("  Outer loop lr: {}", h.outer_loop_lr),
        format!("  Inner loop lr: {}", h.inner_loop_lr),
        format!("  Finetuning lr: {}", h.finetuning_lr),
        format!("  Adaptation steps: {}", h.num_adaptation_steps),
        format!("  Finetuning steps: {}", h.num_finetuning_steps),
        format!("  Dropout: {}", h.dropout_rate),
        format!("  Validation schedule: {:?}", h.validation_schedule),
    ]
    .join("\n")
}

/// Format the experiment section as a string
pub fn format_experiment_info(config: &LeoConfig) -> String {
    let e = &config.experiment;
    let episode = match e.episode_selector() {
        Some(crate::config::EpisodeSelector::Latest) => "latest".to_string(),
        _ => e.episode.to_string(),
    };
    let mut lines = vec![
        format!("  Experiment: {}", e.number),
        format!("  Resume episode: {episode}"),
        format!("  Prompt before overwrite: {}", e.prompt_deletion),
    ];
    if !e.description.is_empty() {
        lines.push(format!("  Description: {}", e.description));
    }
    lines.join("\n")
}

/// Format the class split ratio, if configured
pub fn format_split_info(config: &LeoConfig) -> Option<String> {
    config
        .data_params
        .meta_train_val_test_ratio
        .map(|[train, val, test]| format!("  Class split: train {train} / val {val} / test {test}"))
}

/// Print detailed configuration summary
pub fn print_detailed_summary(config: &LeoConfig) {
    println!();
    println!("Configuration Summary:");
    println!("{}", format_run_info(config));
    println!();
    println!("{}", format_hyperparameters(config));
    println!();
    println!("{}", format_experiment_info(config));

    if let Some(split) = format_split_info(config) {
        println!();
        println!("{split}");
    }
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        print_detailed_summary(&config);
    }

    Ok(())
}
