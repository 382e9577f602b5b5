//! Flattened parameter state for serialization

use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};

/// Information about a stored parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g., "decoder.stage1.up.weight")
    pub name: String,

    /// Parameter shape
    pub shape: Vec<usize>,

    /// Data type of the stored values
    pub dtype: String,
}

/// Named parameters with their values concatenated in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    /// Parameter information
    pub parameters: Vec<ParameterInfo>,

    /// Flattened parameter data
    pub data: Vec<f32>,
}

impl ParameterState {
    /// Flatten `named` in order
    pub fn from_named(named: &[(String, &Tensor)]) -> Self {
        let mut data = Vec::with_capacity(named.iter().map(|(_, t)| t.len()).sum());
        let parameters = named
            .iter()
            .map(|(name, tensor)| {
                data.extend(tensor.data().iter().copied());
                ParameterInfo {
                    name: name.clone(),
                    shape: tensor.shape().to_vec(),
                    dtype: "f32".to_string(),
                }
            })
            .collect();

        Self { parameters, data }
    }

    /// Split the data back into named tensors that require gradients
    pub fn into_named(self) -> Result<Vec<(String, Tensor)>> {
        let expected: usize = self
            .parameters
            .iter()
            .map(|p| p.shape.iter().product::<usize>())
            .sum();
        if expected != self.data.len() {
            return Err(Error::Serialization(format!(
                "parameter state declares {expected} values but holds {}",
                self.data.len()
            )));
        }

        let mut offset = 0;
        self.parameters
            .into_iter()
            .map(|info| {
                if info.dtype != "f32" {
                    return Err(Error::Serialization(format!(
                        "parameter {} has unsupported dtype {}",
                        info.name, info.dtype
                    )));
                }
                let size: usize = info.shape.iter().product();
                let values = self.data[offset..offset + size].to_vec();
                offset += size;
                Ok((info.name, Tensor::from_shape(&info.shape, values, true)?))
            })
            .collect()
    }

    /// Number of stored values
    pub fn num_values(&self) -> usize {
        self.data.len()
    }
}
