use machine_learning::{ModelInput, RawOutput};
use ndarray::{Array2, Axis};

use super::{STATIC_FEATURES, check_window, unexpected_output};
use crate::{
    error::{ForecastError, Result},
    forecast::ForecastMatrix,
    registry::StaticAttributes,
    window::TimeSeriesWindow,
};

/// Keeps each window as a sequence and hands the static attributes over as the recurrent seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceAdapter {
    lag: usize,
    features: usize,
}

impl SequenceAdapter {
    pub fn new(lag: usize, features: usize) -> Self {
        Self { lag, features }
    }

    /// The width of every step of the sequence, the seed carries the statics.
    pub fn input_width(&self) -> usize {
        self.features
    }

    pub fn encode(
        &self,
        window: &TimeSeriesWindow,
        statics: &StaticAttributes,
    ) -> Result<ModelInput> {
        check_window(window, self.lag, self.features)?;

        let statics = statics.to_array();
        let seed = Array2::from_shape_fn((window.len(), STATIC_FEATURES), |(_, k)| statics[k]);

        Ok(ModelInput::Sequence {
            x: window.features().to_owned(),
            seed,
        })
    }

    /// Selects the last step of every output sequence. The backend already de-normalized it.
    pub fn decode(&self, raw: RawOutput, horizon: usize) -> Result<ForecastMatrix> {
        let y = match raw {
            RawOutput::Sequence(y) => y,
            raw => return Err(unexpected_output("sequence", &raw)),
        };

        let steps = y.len_of(Axis(1));
        if steps == 0 {
            return Err(ForecastError::shape("output sequence steps", 0, 1));
        }

        ForecastMatrix::new(y.index_axis(Axis(1), steps - 1).to_owned(), horizon)
    }
}
