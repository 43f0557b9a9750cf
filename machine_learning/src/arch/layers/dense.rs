use ndarray::prelude::*;

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer computing `act_fn(x · W + b)` over a batch of rows.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl Dense {
    /// Creates a new `Dense` from its flat parameter slice.
    ///
    /// # Arguments
    /// * `dim` - The input and output sizes of the layer.
    /// * `params` - The weights (row major, `dim.0 × dim.1`) followed by the `dim.1` biases.
    /// * `act_fn` - An optional activation applied element-wise to the output.
    ///
    /// # Returns
    /// A new `Dense` instance or a size mismatch if `params` has the wrong length.
    pub fn new(dim: (usize, usize), params: &[f32], act_fn: Option<ActFn>) -> Result<Self> {
        let size = (dim.0 + 1) * dim.1;
        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "dense parameters",
                got: params.len(),
                expected: size,
            });
        }

        let (w_raw, b_raw) = params.split_at(dim.0 * dim.1);
        let weights =
            Array2::from_shape_vec(dim, w_raw.to_vec()).map_err(|_| MlErr::SizeMismatch {
                what: "dense weights",
                got: w_raw.len(),
                expected: dim.0 * dim.1,
            })?;

        Ok(Self {
            dim,
            act_fn,
            weights,
            biases: Array1::from(b_raw.to_vec()),
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Makes a forward pass through the layer.
    ///
    /// # Arguments
    /// * `x` - A batch of rows, each of `dim.0` features.
    ///
    /// # Returns
    /// A `(rows, dim.1)` array or a size mismatch if `x` has the wrong width.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let z = x.dot(&self.weights) + &self.biases;

        let Some(ref act_fn) = self.act_fn else {
            return Ok(z);
        };

        Ok(z.mapv_into(|z| act_fn.f(z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_applies_weights_and_bias() {
        // w = [[1, 2], [3, 4]], b = [0.5, -1]
        let dense = Dense::new((2, 2), &[1., 2., 3., 4., 0.5, -1.], None).unwrap();
        let x = array![[1., 1.], [0., 2.]];

        let y = dense.forward(x.view()).unwrap();

        assert_eq!(y, array![[4.5, 5.], [6.5, 7.]]);
    }

    #[test]
    fn forward_applies_activation() {
        let dense = Dense::new((1, 2), &[1., -1., 0., 0.], Some(ActFn::relu())).unwrap();
        let y = dense.forward(array![[2.]].view()).unwrap();
        assert_eq!(y, array![[2., 0.]]);
    }

    #[test]
    fn rejects_wrong_param_count() {
        let err = Dense::new((2, 3), &[0.; 5], None).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { expected: 9, .. }));
    }

    #[test]
    fn rejects_wrong_input_width() {
        let dense = Dense::new((3, 1), &[0.; 4], None).unwrap();
        let err = dense.forward(array![[1., 2.]].view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 2, expected: 3, .. }));
    }
}
