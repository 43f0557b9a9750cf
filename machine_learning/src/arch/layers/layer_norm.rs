use ndarray::prelude::*;

use crate::{MlErr, Result};

pub const DEFAULT_EPS: f32 = 1e-5;

/// Normalizes every row to zero mean and unit (biased) variance, then applies an element-wise
/// affine transform.
#[derive(Clone, Debug)]
pub struct LayerNorm {
    gamma: Array1<f32>,
    beta: Array1<f32>,
    eps: f32,
}

impl LayerNorm {
    pub fn new(gamma: Vec<f32>, beta: Vec<f32>, eps: f32) -> Result<Self> {
        if gamma.len() != beta.len() {
            return Err(MlErr::SizeMismatch {
                what: "layer norm beta",
                got: beta.len(),
                expected: gamma.len(),
            });
        }

        Ok(Self {
            gamma: Array1::from(gamma),
            beta: Array1::from(beta),
            eps,
        })
    }

    /// An identity-initialized layer norm over `dim` features.
    pub fn identity(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            eps: DEFAULT_EPS,
        }
    }

    pub fn dim(&self) -> usize {
        self.gamma.len()
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim() {
            return Err(MlErr::SizeMismatch {
                what: "layer norm input",
                got: x.ncols(),
                expected: self.dim(),
            });
        }

        let mut y = x.to_owned();
        for mut row in y.rows_mut() {
            let mean = row.mean().unwrap_or_default();
            let var = row.mapv(|v| (v - mean).powi(2)).mean().unwrap_or_default();
            let denom = (var + self.eps).sqrt();
            row.mapv_inplace(|v| (v - mean) / denom);
            row *= &self.gamma;
            row += &self.beta;
        }

        Ok(y)
    }
}
