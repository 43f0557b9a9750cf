use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{ForecastError, Result};

/// The pollutant channels of every forecast, in output order.
pub const POLLUTANTS: [&str; 6] = ["co", "no2", "o3", "so2", "pm2_5", "pm10"];

/// The number of pollutant channels.
pub const CHANNELS: usize = POLLUTANTS.len();

/// The decoded forecast of a single location: `horizon` rows of non-negative pollutant values.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastMatrix(Array2<f32>);

impl ForecastMatrix {
    /// Creates a new `ForecastMatrix` clamping negative concentrations to zero.
    ///
    /// # Arguments
    /// * `values` - The decoded `(horizon, channels)` values.
    /// * `horizon` - The number of rows the caller expects.
    ///
    /// # Returns
    /// The matrix or `AdapterShapeMismatch` if the shape isn't `(horizon, CHANNELS)`.
    pub fn new(mut values: Array2<f32>, horizon: usize) -> Result<Self> {
        let (rows, cols) = values.dim();
        if cols != CHANNELS {
            return Err(ForecastError::shape("pollutant channels", cols, CHANNELS));
        }
        if rows != horizon {
            return Err(ForecastError::shape("forecast rows", rows, horizon));
        }

        values.mapv_inplace(|v| if v <= 0. { 0. } else { v });
        Ok(Self(values))
    }

    pub fn horizon(&self) -> usize {
        self.0.nrows()
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.0.row(i)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn negative_values_are_clamped() {
        let matrix = ForecastMatrix::new(array![[-1., 2., -0., 0.5, -3., 4.]], 1).unwrap();

        assert_eq!(matrix.row(0).to_vec(), vec![0., 2., 0., 0.5, 0., 4.]);
        assert!(matrix.values().iter().all(|v| v.is_sign_positive()));
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let err = ForecastMatrix::new(Array2::zeros((2, 5)), 2).unwrap_err();
        assert!(matches!(err, ForecastError::AdapterShapeMismatch(_)));

        let err = ForecastMatrix::new(Array2::zeros((2, CHANNELS)), 3).unwrap_err();
        assert!(matches!(err, ForecastError::AdapterShapeMismatch(_)));
    }
}
