use ndarray::{Array2, ArrayView2};

use super::{Dense, LayerNorm};
use crate::Result;

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    LayerNorm(LayerNorm),
}
use Layer::*;

impl Layer {
    pub fn input_size(&self) -> usize {
        match self {
            Dense(l) => l.dim().0,
            LayerNorm(l) => l.dim(),
        }
    }

    pub fn output_size(&self) -> usize {
        match self {
            Dense(l) => l.dim().1,
            LayerNorm(l) => l.dim(),
        }
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(x),
            LayerNorm(l) => l.forward(x),
        }
    }
}
