//! Meta-gradient averaging and the meta update

use super::TaskGradients;
use crate::model::MetaParameters;
use crate::optim::{Adam, AdamState, Optimizer};
use crate::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Running uniform average of per-task meta-gradients.
#[derive(Debug, Clone)]
pub struct MetaGradientAccumulator {
    num_tasks: usize,
    added: usize,
    total: Option<TaskGradients>,
}

impl MetaGradientAccumulator {
    /// Accumulator for a batch of `num_tasks` tasks
    pub fn new(num_tasks: usize) -> Self {
        Self {
            num_tasks: num_tasks.max(1),
            added: 0,
            total: None,
        }
    }

    /// Add one task's gradients scaled by `1 / num_tasks`.
    pub fn add(&mut self, grads: &TaskGradients) -> Result<()> {
        let weight = 1.0 / self.num_tasks as f32;
        match &mut self.total {
            None => {
                self.total = Some(TaskGradients {
                    head: &grads.head * weight,
                    decoder: grads.decoder.iter().map(|g| g * weight).collect(),
                });
            }
            Some(total) => {
                if total.decoder.len() != grads.decoder.len() {
                    return Err(Error::shape(
                        "MetaGradientAccumulator::add",
                        &[total.decoder.len()],
                        &[grads.decoder.len()],
                    ));
                }
                add_scaled(&mut total.head, &grads.head, weight)?;
                for (acc, g) in total.decoder.iter_mut().zip(&grads.decoder) {
                    add_scaled(acc, g, weight)?;
                }
            }
        }
        self.added += 1;
        Ok(())
    }

    /// Tasks added so far
    pub fn tasks_added(&self) -> usize {
        self.added
    }

    /// Averaged gradients, `None` if nothing was added
    pub fn finish(self) -> Option<TaskGradients> {
        self.total
    }
}

fn add_scaled(acc: &mut Array1<f32>, g: &Array1<f32>, weight: f32) -> Result<()> {
    if acc.len() != g.len() {
        return Err(Error::shape("MetaGradientAccumulator::add", &[acc.len()], &[g.len()]));
    }
    acc.scaled_add(weight, g);
    Ok(())
}

/// Serializable state of both Adam instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub decoder: AdamState,
    pub head: AdamState,
}

/// Applies averaged meta-gradients with one Adam for the decoder and one
/// for the head weight.
#[derive(Debug, Clone)]
pub struct MetaOptimizer {
    decoder: Adam,
    head: Adam,
}

impl MetaOptimizer {
    /// Both optimizers at learning rate `lr` with default betas
    pub fn new(lr: f32) -> Self {
        Self {
            decoder: Adam::default_params(lr),
            head: Adam::default_params(lr),
        }
    }

    pub fn from_state(state: OptimizerState) -> Result<Self> {
        Ok(Self {
            decoder: Adam::from_state(state.decoder)?,
            head: Adam::from_state(state.head)?,
        })
    }

    pub fn state(&self) -> OptimizerState {
        OptimizerState {
            decoder: self.decoder.state(),
            head: self.head.state(),
        }
    }

    /// Meta updates applied so far
    pub fn step_count(&self) -> u64 {
        self.head.step_count()
    }

    /// Learning rate of both optimizers
    pub fn lr(&self) -> f32 {
        self.head.lr()
    }

    pub fn set_lr(&mut self, lr: f32) {
        self.decoder.set_lr(lr);
        self.head.set_lr(lr);
    }

    /// Average `task_grads` uniformly and apply one update.
    ///
    /// An empty batch leaves the parameters unchanged.
    pub fn accumulate_and_apply(
        &mut self,
        params: &mut MetaParameters,
        task_grads: &[TaskGradients],
    ) -> Result<()> {
        let mut accumulator = MetaGradientAccumulator::new(task_grads.len());
        for grads in task_grads {
            accumulator.add(grads)?;
        }
        match accumulator.finish() {
            Some(average) => self.apply(params, average),
            None => Ok(()),
        }
    }

    /// Write `grads` into the parameters' gradient slots and step both optimizers.
    pub fn apply(&mut self, params: &mut MetaParameters, grads: TaskGradients) -> Result<()> {
        let decoder_params = params.decoder.parameters();
        if decoder_params.len() != grads.decoder.len() {
            return Err(Error::shape(
                "MetaOptimizer::apply",
                &[decoder_params.len()],
                &[grads.decoder.len()],
            ));
        }
        if grads.head.len() != params.head_weight.len() {
            return Err(Error::shape(
                "MetaOptimizer::apply",
                &[params.head_weight.len()],
                &[grads.head.len()],
            ));
        }
        for (param, g) in decoder_params.iter().zip(&grads.decoder) {
            if param.len() != g.len() {
                return Err(Error::shape("MetaOptimizer::apply", param.shape(), &[g.len()]));
            }
        }

        params.zero_grad();
        for (param, g) in params.decoder.parameters().into_iter().zip(grads.decoder) {
            param.set_grad(g);
        }
        params.head_weight.set_grad(grads.head);

        self.decoder.step_refs(&mut params.decoder.parameters_mut());
        self.head.step_refs(&mut [&mut params.head_weight]);
        params.zero_grad();
        Ok(())
    }
}
