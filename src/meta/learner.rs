//! Episode driver

use super::{
    InnerLoopAdapter, MetaOptimizer, Mode, OuterLoopFinetuner, TaskGradients, TrainStats,
};
use crate::autograd::Context;
use crate::config::{validate_config, LeoConfig};
use crate::data::EpisodeBatch;
use crate::io::{CheckpointRecord, CheckpointStore, ConfirmationProvider, ParameterState};
use crate::model::{FeatureEncoder, MetaParameters};
use crate::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Owns the model, the meta optimizer and the statistics of a run.
pub struct MetaLearner {
    config: LeoConfig,
    encoder: FeatureEncoder,
    params: MetaParameters,
    optimizer: MetaOptimizer,
    stats: TrainStats,
    ctx: Context,
}

impl MetaLearner {
    /// Validate `config` and build a freshly initialized learner
    pub fn new(config: LeoConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            encoder: FeatureEncoder::new(config.seed),
            params: MetaParameters::new(config.seed),
            optimizer: MetaOptimizer::new(config.hyperparameters.outer_loop_lr),
            stats: TrainStats::new(),
            ctx: Context::with_seed(config.seed),
            config,
        })
    }

    pub fn config(&self) -> &LeoConfig {
        &self.config
    }

    pub fn stats(&self) -> &TrainStats {
        &self.stats
    }

    pub fn parameters(&self) -> &MetaParameters {
        &self.params
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn optimizer(&self) -> &MetaOptimizer {
        &self.optimizer
    }

    /// Run one episode over `batch` and return the mean validation loss.
    ///
    /// Every task is adapted and validated in order. In `MetaTrain` the
    /// per-task meta-gradients are averaged and applied once after the last
    /// task; the other modes leave the meta-parameters untouched.
    pub fn compute_loss(&mut self, batch: &EpisodeBatch, mode: Mode) -> Result<f32> {
        let interval = self.config.display_stats_interval;
        if interval > 0 && self.stats.episode % interval == 1 {
            tracing::info!("{}", batch.shape_summary());
        }

        if mode.is_training() {
            self.ctx.train();
        } else {
            self.ctx.eval();
        }
        self.params.zero_grad();

        let hyper = &self.config.hyperparameters;
        let adapter = InnerLoopAdapter::new(&self.encoder, &self.params, hyper.dropout_rate);
        let finetuner = OuterLoopFinetuner::new(&self.encoder, &self.params, hyper);

        let mut task_grads: Vec<TaskGradients> = Vec::with_capacity(batch.len());
        let mut mean_iou = BTreeMap::new();
        let mut total_val_loss = 0.0;

        for task in batch.tasks() {
            let adaptation = adapter.adapt_latent(
                task.train_images(),
                task.train_masks(),
                hyper.num_adaptation_steps,
                hyper.inner_loop_lr,
                &mut self.ctx,
            )?;
            let outcome = finetuner.finetune(
                task,
                &adaptation.features,
                &adaptation.head_gradient,
                mode,
                &mut self.ctx,
            )?;
            tracing::debug!(
                class = task.class_name(),
                train_loss = adaptation.train_loss,
                val_loss = outcome.val_loss,
                iou = outcome.mean_iou,
                "task finished"
            );

            task_grads.extend(outcome.gradients);
            mean_iou.insert(task.class_name().to_string(), outcome.mean_iou);
            total_val_loss += outcome.val_loss;
        }

        if mode.is_training() {
            self.optimizer.accumulate_and_apply(&mut self.params, &task_grads)?;
        }

        let total_val_loss = total_val_loss / batch.len() as f32;
        self.stats.update(mode, total_val_loss, mean_iou);
        tracing::info!(
            episode = self.stats.episode,
            mode = %mode,
            total_val_loss,
            "episode finished"
        );
        Ok(total_val_loss)
    }

    /// Snapshot of the current training state
    pub fn checkpoint_record(&self) -> CheckpointRecord {
        CheckpointRecord {
            mode: self.stats.mode,
            episode: self.stats.episode,
            model_state: ParameterState::from_named(&self.params.named_parameters()),
            optimizer_state: self.optimizer.state(),
            backbone_seed: self.encoder.seed(),
            aux_loss: self.stats.aux_loss,
            total_val_loss: self.stats.total_val_loss,
            mean_iou: self.stats.mean_iou.clone(),
        }
    }

    /// Persist the current state under the current episode number
    pub fn save_checkpoint(
        &self,
        store: &CheckpointStore,
        confirm: &mut dyn ConfirmationProvider,
    ) -> Result<PathBuf> {
        store.save(&self.checkpoint_record(), confirm)
    }

    /// Load the configured checkpoint from `store`; returns its episode
    pub fn resume(&mut self, store: &CheckpointStore) -> Result<u64> {
        let record = store.load_configured()?;
        let episode = record.episode;
        self.restore(record)?;
        Ok(episode)
    }

    /// Replace parameters, optimizer state and statistics with `record`.
    ///
    /// The optimizer keeps the configured outer-loop learning rate.
    pub fn restore(&mut self, record: CheckpointRecord) -> Result<()> {
        let stats = record.stats();
        let params = MetaParameters::from_named(record.model_state.into_named()?)?;
        let mut optimizer = MetaOptimizer::from_state(record.optimizer_state)?;
        optimizer.set_lr(self.config.hyperparameters.outer_loop_lr);

        if record.backbone_seed != self.encoder.seed() {
            tracing::warn!(
                configured = self.encoder.seed(),
                checkpoint = record.backbone_seed,
                "checkpoint was trained with a different backbone seed; using the checkpoint's"
            );
            self.encoder = FeatureEncoder::new(record.backbone_seed);
        }

        self.params = params;
        self.optimizer = optimizer;
        self.stats = stats;
        Ok(())
    }
}
