//! Adam optimizer

use super::Optimizer;
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Adam optimizer
///
/// m_t = β1 * m_{t-1} + (1 - β1) * g
/// v_t = β2 * v_{t-1} + (1 - β2) * g²
/// θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε), with lr_t = lr * √(1 - β2^t) / (1 - β1^t)
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

/// Serializable snapshot of an [`Adam`] optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub step: u64,
    pub first_moments: Vec<Option<Array1<f32>>>,
    pub second_moments: Vec<Option<Array1<f32>>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with default parameters (β1 = 0.9, β2 = 0.999, ε = 1e-8)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Get optimizer step counter.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Get first moment buffers (m).
    #[must_use]
    pub fn first_moments(&self) -> &[Option<Array1<f32>>] {
        &self.m
    }

    /// Get second moment buffers (v).
    #[must_use]
    pub fn second_moments(&self) -> &[Option<Array1<f32>>] {
        &self.v
    }

    /// Snapshot hyperparameters, step counter and moment buffers.
    pub fn state(&self) -> AdamState {
        AdamState {
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            step: self.t,
            first_moments: self.m.clone(),
            second_moments: self.v.clone(),
        }
    }

    /// Rebuild an optimizer from a snapshot.
    pub fn from_state(state: AdamState) -> Result<Self> {
        if state.first_moments.len() != state.second_moments.len() {
            return Err(Error::Serialization(format!(
                "Adam state has {} first moments but {} second moments",
                state.first_moments.len(),
                state.second_moments.len()
            )));
        }
        for (m, v) in state.first_moments.iter().zip(&state.second_moments) {
            let lens = (m.as_ref().map(Array1::len), v.as_ref().map(Array1::len));
            if lens.0 != lens.1 {
                return Err(Error::Serialization(
                    "Adam moment buffers differ in length".to_string(),
                ));
            }
        }
        Ok(Self {
            lr: state.lr,
            beta1: state.beta1,
            beta2: state.beta2,
            epsilon: state.epsilon,
            t: state.step,
            m: state.first_moments,
            v: state.second_moments,
        })
    }
}

impl Optimizer for Adam {
    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
        self.t += 1;

        // Bias correction factors
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };

            // m_t = β1 * m_{t-1} + (1 - β1) * g
            let m_t = match &self.m[i] {
                Some(m) => m * self.beta1 + &grad * (1.0 - self.beta1),
                None => &grad * (1.0 - self.beta1),
            };

            // v_t = β2 * v_{t-1} + (1 - β2) * g²
            let grad_sq = &grad * &grad;
            let v_t = match &self.v[i] {
                Some(v) => v * self.beta2 + &grad_sq * (1.0 - self.beta2),
                None => &grad_sq * (1.0 - self.beta2),
            };

            let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
            *param.data_mut() -= &update;

            self.m[i] = Some(m_t);
            self.v[i] = Some(v_t);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
