use ndarray::{Array2, ArrayView2};

use super::layers::Layer;
use crate::{MlErr, Result};

/// A sequential model: information flows forward through its layers in order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance, or a size mismatch if adjacent layers don't fit together.
    pub fn new<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<_> = layers.into_iter().collect();

        for pair in layers.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.output_size() != next.input_size() {
                return Err(MlErr::SizeMismatch {
                    what: "adjacent layers",
                    got: next.input_size(),
                    expected: prev.output_size(),
                });
            }
        }

        Ok(Self { layers })
    }

    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(Layer::input_size)
    }

    pub fn output_size(&self) -> Option<usize> {
        self.layers.last().map(Layer::output_size)
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut layers = self.layers.iter();

        let Some(first) = layers.next() else {
            return Ok(x.to_owned());
        };

        layers.try_fold(first.forward(x)?, |x, layer| layer.forward(x.view()))
    }
}
