use machine_learning::{ModelInput, RawOutput};
use ndarray::{Array2, ArrayView1, s};

use super::{STATIC_FEATURES, check_window, unexpected_output};
use crate::{
    error::Result, forecast::ForecastMatrix, registry::StaticAttributes, window::TimeSeriesWindow,
};

/// Flattens each window into a single row followed by the location's static attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatAdapter {
    lag: usize,
    features: usize,
}

impl FlatAdapter {
    pub fn new(lag: usize, features: usize) -> Self {
        Self { lag, features }
    }

    pub fn input_width(&self) -> usize {
        self.lag * self.features + STATIC_FEATURES
    }

    pub fn encode(
        &self,
        window: &TimeSeriesWindow,
        statics: &StaticAttributes,
    ) -> Result<ModelInput> {
        check_window(window, self.lag, self.features)?;

        let width = self.lag * self.features;
        let statics = statics.to_array();
        let mut x = Array2::zeros((window.len(), self.input_width()));
        for (mut row, win) in x.outer_iter_mut().zip(window.features().outer_iter()) {
            for (dst, src) in row.slice_mut(s![..width]).iter_mut().zip(win.iter()) {
                *dst = *src;
            }
            row.slice_mut(s![width..]).assign(&ArrayView1::from(&statics));
        }

        Ok(ModelInput::Flat(x))
    }

    /// The backend emits physical units, decoding only checks the shape and clamps.
    pub fn decode(&self, raw: RawOutput, horizon: usize) -> Result<ForecastMatrix> {
        match raw {
            RawOutput::Rows(rows) => ForecastMatrix::new(rows, horizon),
            raw => Err(unexpected_output("flat", &raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::RawOutput;
    use ndarray::{Array1, Array2, array};

    use super::*;
    use crate::{
        adapters::tests::{STATICS, window},
        error::ForecastError,
    };

    #[test]
    fn rows_are_row_major_windows_plus_statics() {
        let adapter = FlatAdapter::new(2, 2);

        let ModelInput::Flat(x) = adapter.encode(&window(2, 2, 2), &STATICS).unwrap() else {
            panic!("expected a flat input");
        };

        assert_eq!(
            x,
            array![
                [0., 1., 2., 3., 10., 106., 1_000_000.],
                [4., 5., 6., 7., 10., 106., 1_000_000.],
            ]
        );
    }

    #[test]
    fn decode_keeps_rows_and_clamps() {
        let adapter = FlatAdapter::new(2, 2);
        let raw = RawOutput::Rows(array![[1., -2., 3., 4., 5., 6.]]);

        let matrix = adapter.decode(raw, 1).unwrap();
        assert_eq!(matrix.row(0).to_vec(), vec![1., 0., 3., 4., 5., 6.]);
    }

    #[test]
    fn decode_rejects_other_outputs() {
        let adapter = FlatAdapter::new(2, 2);

        let err = adapter.decode(RawOutput::Flat(Array1::zeros(6)), 1).unwrap_err();
        assert!(matches!(err, ForecastError::AdapterShapeMismatch(_)));

        let err = adapter.decode(RawOutput::Rows(Array2::zeros((2, 6))), 1).unwrap_err();
        assert!(matches!(err, ForecastError::AdapterShapeMismatch(_)));
    }
}
