mod flat;
mod joint;
mod sequence;

pub use flat::FlatAdapter;
pub use joint::JointAdapter;
pub use sequence::SequenceAdapter;

use machine_learning::{ModelInput, RawOutput};

use crate::{
    error::{ForecastError, Result},
    forecast::ForecastMatrix,
    registry::StaticAttributes,
    window::TimeSeriesWindow,
};

/// The number of static attributes appended to, or seeded into, per-location inputs.
pub const STATIC_FEATURES: usize = 3;

/// The encode/decode pair of a backend that forecasts one location at a time.
#[derive(Debug, Clone)]
pub enum Adapter {
    Flat(FlatAdapter),
    Sequence(SequenceAdapter),
}

impl Adapter {
    pub fn name(&self) -> &'static str {
        use Adapter::*;

        match self {
            Flat(_) => "flat",
            Sequence(_) => "sequence",
        }
    }

    /// The number of features the backend receives per row.
    pub fn input_width(&self) -> usize {
        use Adapter::*;

        match self {
            Flat(a) => a.input_width(),
            Sequence(a) => a.input_width(),
        }
    }

    /// Shapes a location's windows into the backend's input.
    ///
    /// # Arguments
    /// * `window` - The lag windows of the location.
    /// * `statics` - The static attributes of the location.
    ///
    /// # Returns
    /// The model input or `AdapterShapeMismatch` if the window doesn't have the configured shape.
    pub fn encode(
        &self,
        window: &TimeSeriesWindow,
        statics: &StaticAttributes,
    ) -> Result<ModelInput> {
        use Adapter::*;

        match self {
            Flat(a) => a.encode(window, statics),
            Sequence(a) => a.encode(window, statics),
        }
    }

    /// Turns the backend's output back into a forecast.
    ///
    /// # Arguments
    /// * `raw` - The raw backend output.
    /// * `horizon` - The number of forecast rows expected, one per window.
    pub fn decode(&self, raw: RawOutput, horizon: usize) -> Result<ForecastMatrix> {
        use Adapter::*;

        match self {
            Flat(a) => a.decode(raw, horizon),
            Sequence(a) => a.decode(raw, horizon),
        }
    }
}

/// Checks that a window has the lag and feature count an adapter was configured with.
fn check_window(window: &TimeSeriesWindow, lag: usize, features: usize) -> Result<()> {
    if window.lag() != lag {
        return Err(ForecastError::shape("window lag", window.lag(), lag));
    }
    if window.feature_count() != features {
        return Err(ForecastError::shape(
            "window features",
            window.feature_count(),
            features,
        ));
    }
    Ok(())
}

fn unexpected_output(adapter: &str, raw: &RawOutput) -> ForecastError {
    ForecastError::AdapterShapeMismatch(format!(
        "the {adapter} adapter cannot decode a {} output",
        raw.kind()
    ))
}
