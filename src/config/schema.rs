//! Configuration schema for meta-training experiments

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Deserialize a bool from either a YAML boolean (`true`) or a quoted string (`"true"`).
fn deserialize_bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

/// When the finetuning loop runs its validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSchedule {
    /// Run every descent step, then validate the final task-local weight
    #[default]
    AfterAllSteps,
    /// Validate right after the first descent step and skip the rest
    AfterFirstStep,
}

/// Which checkpoint of an experiment to resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeSelector {
    /// Highest episode number on disk
    Latest,
    /// Exactly this episode
    Exact(u64),
}

impl EpisodeSelector {
    /// Sentinel used in configuration files for [`EpisodeSelector::Latest`]
    pub const LATEST: i64 = -1;

    /// Interpret a configured episode value; `None` for values below the sentinel.
    pub fn from_config(episode: i64) -> Option<Self> {
        match episode {
            Self::LATEST => Some(Self::Latest),
            e if e >= 0 => Some(Self::Exact(e as u64)),
            _ => None,
        }
    }
}

/// Complete experiment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeoConfig {
    /// Root directory; checkpoints live under `<data_path>/models`
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Request a GPU backend (only the CPU backend exists)
    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub use_gpu: bool,

    /// Element type of every tensor
    #[serde(default = "default_dtype")]
    pub dtype: String,

    /// Episodes between batch shape reports
    #[serde(default = "default_display_stats_interval")]
    pub display_stats_interval: u64,

    /// Seed for backbone initialisation, dropout masks and class shuffling
    #[serde(default)]
    pub seed: u64,

    /// Learning rates, step counts and regularisation
    #[serde(default)]
    pub hyperparameters: Hyperparameters,

    /// Experiment identity and checkpoint policy
    #[serde(default)]
    pub experiment: ExperimentSpec,

    /// Dataset split parameters
    #[serde(default)]
    pub data_params: DataParams,
}

impl Default for LeoConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            use_gpu: false,
            dtype: default_dtype(),
            display_stats_interval: default_display_stats_interval(),
            seed: 0,
            hyperparameters: Hyperparameters::default(),
            experiment: ExperimentSpec::default(),
            data_params: DataParams::default(),
        }
    }
}

impl LeoConfig {
    /// Directory holding this experiment's checkpoints and logs
    pub fn model_dir(&self) -> PathBuf {
        self.data_path
            .join("models")
            .join(format!("experiment_{}", self.experiment.number))
    }
}

/// Optimization hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Adam learning rate of the meta update
    #[serde(default = "default_outer_loop_lr")]
    pub outer_loop_lr: f32,

    /// Step size of latent adaptation
    #[serde(default = "default_inner_loop_lr")]
    pub inner_loop_lr: f32,

    /// Step size of task-local head adaptation
    #[serde(default = "default_finetuning_lr")]
    pub finetuning_lr: f32,

    /// Latent descent steps per task
    #[serde(default = "default_num_adaptation_steps")]
    pub num_adaptation_steps: usize,

    /// Head descent steps per task, counting the initial one
    #[serde(default = "default_num_finetuning_steps")]
    pub num_finetuning_steps: usize,

    /// Dropout rate inside decoder blocks
    #[serde(default = "default_dropout_rate")]
    pub dropout_rate: f32,

    /// When the finetuning loop validates
    #[serde(default)]
    pub validation_schedule: ValidationSchedule,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            outer_loop_lr: default_outer_loop_lr(),
            inner_loop_lr: default_inner_loop_lr(),
            finetuning_lr: default_finetuning_lr(),
            num_adaptation_steps: default_num_adaptation_steps(),
            num_finetuning_steps: default_num_finetuning_steps(),
            dropout_rate: default_dropout_rate(),
            validation_schedule: ValidationSchedule::default(),
        }
    }
}

/// Experiment identity and checkpoint policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Experiment number, names `models/experiment_<number>`
    #[serde(default = "default_experiment_number")]
    pub number: u32,

    /// Checkpoint episode to resume from, `-1` for the latest
    #[serde(default = "default_episode")]
    pub episode: i64,

    /// Ask before overwriting an existing checkpoint
    #[serde(default = "default_true", deserialize_with = "deserialize_bool_lenient")]
    pub prompt_deletion: bool,

    /// Free text written at the top of the experiment log
    #[serde(default)]
    pub description: String,
}

impl Default for ExperimentSpec {
    fn default() -> Self {
        Self {
            number: default_experiment_number(),
            episode: default_episode(),
            prompt_deletion: true,
            description: String::new(),
        }
    }
}

impl ExperimentSpec {
    /// Configured episode as a selector, `None` if out of range
    pub fn episode_selector(&self) -> Option<EpisodeSelector> {
        EpisodeSelector::from_config(self.episode)
    }
}

/// Dataset split parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataParams {
    /// Class counts for meta_train, meta_val and meta_test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_train_val_test_ratio: Option<[usize; 3]>,
}

fn default_data_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_dtype() -> String {
    "float32".to_string()
}

fn default_display_stats_interval() -> u64 {
    10
}

fn default_outer_loop_lr() -> f32 {
    0.001
}

fn default_inner_loop_lr() -> f32 {
    0.1
}

fn default_finetuning_lr() -> f32 {
    0.01
}

fn default_num_adaptation_steps() -> usize {
    5
}

fn default_num_finetuning_steps() -> usize {
    5
}

fn default_dropout_rate() -> f32 {
    0.3
}

fn default_experiment_number() -> u32 {
    1
}

fn default_episode() -> i64 {
    EpisodeSelector::LATEST
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: LeoConfig = serde_yaml::from_str("seed: 3\n").unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(config.dtype, "float32");
        assert_eq!(config.hyperparameters, Hyperparameters::default());
        assert_eq!(config.experiment.episode, -1);
        assert!(config.experiment.prompt_deletion);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
data_path: /tmp/leo
use_gpu: "true"
display_stats_interval: 2
hyperparameters:
  outer_loop_lr: 0.005
  inner_loop_lr: 0.5
  finetuning_lr: 0.02
  num_adaptation_steps: 0
  num_finetuning_steps: 1
  dropout_rate: 0.0
  validation_schedule: after_first_step
experiment:
  number: 7
  episode: 12
  prompt_deletion: false
  description: baseline
data_params:
  meta_train_val_test_ratio: [3, 2, 1]
"#;
        let config: LeoConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.use_gpu);
        assert_eq!(
            config.hyperparameters.validation_schedule,
            ValidationSchedule::AfterFirstStep
        );
        assert_eq!(config.experiment.episode_selector(), Some(EpisodeSelector::Exact(12)));
        assert_eq!(config.data_params.meta_train_val_test_ratio, Some([3, 2, 1]));
        assert_eq!(config.model_dir(), PathBuf::from("/tmp/leo/models/experiment_7"));
    }

    #[test]
    fn test_lenient_bool_rejects_garbage() {
        let yaml = "experiment:\n  prompt_deletion: maybe\n";
        assert!(serde_yaml::from_str::<LeoConfig>(yaml).is_err());
    }

    #[test]
    fn test_episode_selector() {
        assert_eq!(EpisodeSelector::from_config(-1), Some(EpisodeSelector::Latest));
        assert_eq!(EpisodeSelector::from_config(0), Some(EpisodeSelector::Exact(0)));
        assert_eq!(EpisodeSelector::from_config(-2), None);
    }

    #[test]
    fn test_json_round_trip() {
        let config = LeoConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: LeoConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
