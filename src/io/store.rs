//! Checkpoint persistence keyed by experiment and episode

use super::confirm::{Answer, ConfirmationProvider};
use super::CheckpointRecord;
use crate::config::{EpisodeSelector, ExperimentSpec, LeoConfig};
use crate::meta::TrainStats;
use crate::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replies accepted before an overwrite is abandoned
pub const CONFIRMATION_ATTEMPTS: usize = 3;

const MODEL_LOG: &str = "model_log.txt";
const VAL_STATS_LOG: &str = "val_stats_log.txt";

/// Whether an experiment starts fresh or continues from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentStatus {
    New,
    Resumable,
}

/// Checkpoints and logs of one experiment directory.
///
/// Files are `checkpoint_<episode>.tar` holding a JSON [`CheckpointRecord`],
/// next to the append-only `model_log.txt` and `val_stats_log.txt`.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    experiment: ExperimentSpec,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, experiment: ExperimentSpec) -> Self {
        Self {
            dir: dir.into(),
            experiment,
        }
    }

    /// Store for `<data_path>/models/experiment_<number>`
    pub fn from_config(config: &LeoConfig) -> Self {
        Self::new(config.model_dir(), config.experiment.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn experiment(&self) -> &ExperimentSpec {
        &self.experiment
    }

    pub fn checkpoint_path(&self, episode: u64) -> PathBuf {
        self.dir.join(format!("checkpoint_{episode}.tar"))
    }

    /// Classify the configured experiment, starting logs when it is new.
    ///
    /// A missing directory is created. An existing directory is resumable if
    /// the configured checkpoint exists or the latest one is requested.
    pub fn check_experiment(&self) -> Result<ExperimentStatus> {
        let selector = self.selector()?;
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            self.start_logs();
            return Ok(ExperimentStatus::New);
        }

        let resumable = match selector {
            EpisodeSelector::Latest => true,
            EpisodeSelector::Exact(episode) => self.checkpoint_path(episode).exists(),
        };
        if resumable {
            Ok(ExperimentStatus::Resumable)
        } else {
            self.start_logs();
            Ok(ExperimentStatus::New)
        }
    }

    /// Episode numbers of every checkpoint file, ascending
    pub fn list_episodes(&self) -> Result<Vec<u64>> {
        if !self.dir.is_dir() {
            return Err(Error::CheckpointDirMissing(self.dir.clone()));
        }
        let mut episodes: Vec<u64> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_episode(&entry.file_name().to_string_lossy()))
            .collect();
        episodes.sort_unstable();
        Ok(episodes)
    }

    /// Write `record`, asking `confirm` before replacing an existing file.
    ///
    /// Records holding NaN or infinite values are refused with
    /// [`Error::Serialization`] before anything is written.
    /// Without `prompt_deletion` an existing checkpoint is replaced silently.
    /// A "no" aborts with [`Error::OverwriteRefused`]; after
    /// [`CONFIRMATION_ATTEMPTS`] unrecognized replies the save aborts with
    /// [`Error::ConfirmationExhausted`]. Either way the old file is untouched.
    pub fn save(
        &self,
        record: &CheckpointRecord,
        confirm: &mut dyn ConfirmationProvider,
    ) -> Result<PathBuf> {
        record.check_finite()?;
        fs::create_dir_all(&self.dir)?;
        let path = self.checkpoint_path(record.episode);
        let replacing = path.exists();

        if replacing && self.experiment.prompt_deletion {
            self.confirm_overwrite(record.episode, confirm)?;
        }

        let json = serde_json::to_vec(record)?;
        let tmp = path.with_extension("tar.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        if replacing {
            self.log(
                MODEL_LOG,
                &format!("\n*********** checkpoint {} was deleted **************", record.episode),
            );
        }
        tracing::info!(episode = record.episode, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    fn confirm_overwrite(&self, episode: u64, confirm: &mut dyn ConfirmationProvider) -> Result<()> {
        let prompt = format!(
            "Are you sure you want to delete checkpoint: {episode}\nType Yes or y to confirm deletion else No or n"
        );
        for attempt in 1..=CONFIRMATION_ATTEMPTS {
            match Answer::parse(&confirm.confirm(&prompt)?) {
                Some(Answer::Yes) => return Ok(()),
                Some(Answer::No) => return Err(Error::OverwriteRefused { episode }),
                None => tracing::warn!(
                    remaining = CONFIRMATION_ATTEMPTS - attempt,
                    "wrong value supplied"
                ),
            }
        }
        Err(Error::ConfirmationExhausted {
            episode,
            attempts: CONFIRMATION_ATTEMPTS,
        })
    }

    /// Load the checkpoint chosen by `selector`
    pub fn load(&self, selector: EpisodeSelector) -> Result<CheckpointRecord> {
        let episode = match selector {
            EpisodeSelector::Exact(episode) => {
                if !self.dir.is_dir() {
                    return Err(Error::CheckpointDirMissing(self.dir.clone()));
                }
                episode
            }
            EpisodeSelector::Latest => self
                .list_episodes()?
                .pop()
                .ok_or_else(|| Error::CheckpointNotFound(self.dir.join("checkpoint_<latest>.tar")))?,
        };

        let path = self.checkpoint_path(episode);
        if !path.is_file() {
            return Err(Error::CheckpointNotFound(path));
        }
        let record: CheckpointRecord = serde_json::from_slice(&fs::read(&path)?)?;

        self.log(
            MODEL_LOG,
            &format!("\n*********** checkpoint {episode} was loaded **************"),
        );
        tracing::info!(episode, path = %path.display(), "checkpoint loaded");
        Ok(record)
    }

    /// Load the checkpoint named by the experiment's configured episode
    pub fn load_configured(&self) -> Result<CheckpointRecord> {
        self.load(self.selector()?)
    }

    /// Append the episode's validation statistics to `val_stats_log.txt`
    pub fn log_val_stats(&self, stats: &TrainStats) {
        let mut msg = format!("\nEpisode {} ({})", stats.episode, stats.mode);
        if let Some(loss) = stats.total_val_loss {
            msg.push_str(&format!("\ntotal_val_loss: {loss}"));
        }
        for (class, iou) in &stats.mean_iou {
            msg.push_str(&format!("\n{class}: {iou}"));
        }
        self.log(VAL_STATS_LOG, &msg);
    }

    fn selector(&self) -> Result<EpisodeSelector> {
        self.experiment.episode_selector().ok_or_else(|| {
            Error::Config(format!(
                "experiment.episode must be -1 or a checkpoint number, got {}",
                self.experiment.episode
            ))
        })
    }

    fn start_logs(&self) {
        self.log(
            MODEL_LOG,
            &format!(
                "*********************Experiment {}********************\nDescription: {}",
                self.experiment.number, self.experiment.description
            ),
        );
        self.log(VAL_STATS_LOG, "*******************Val stats *************");
    }

    /// Best-effort append; failures are reported and otherwise ignored
    fn log(&self, file: &str, msg: &str) {
        let path = self.dir.join(file);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(msg.as_bytes()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "could not append to log");
        }
    }
}

/// Episode of a `checkpoint_<episode>.tar` file name
fn parse_episode(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("checkpoint_")?
        .strip_suffix(".tar")?
        .parse()
        .ok()
}
