use ndarray::{Array1, Array2, Array3};

use crate::Result;

/// How a backend's raw output relates to physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// The backend de-normalizes its own output, no external state is needed.
    SelfScaling,
    /// The caller must supply the scalers that map inputs into, and outputs out of, the
    /// backend's normalized space.
    ExternallyScaled,
}

/// The input a backend consumes, shaped by the adapter that produced it.
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// One flattened feature row per forecast step: `(rows, lag * features + statics)`.
    Flat(Array2<f32>),
    /// Per-step sequences `(m, lag, features)` and their static seeds `(m, statics)`.
    Sequence { x: Array3<f32>, seed: Array2<f32> },
    /// All entities sharing one time window: `(entities, lag, features)`.
    Joint(Array3<f32>),
}

impl ModelInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelInput::Flat(_) => "flat",
            ModelInput::Sequence { .. } => "sequence",
            ModelInput::Joint(_) => "joint",
        }
    }
}

/// The output of a single backend call.
#[derive(Debug, Clone)]
pub enum RawOutput {
    /// One row of channels per input row.
    Rows(Array2<f32>),
    /// A full output sequence per input sequence: `(m, steps, channels)`.
    Sequence(Array3<f32>),
    /// A single flattened tensor, entity major.
    Flat(Array1<f32>),
}

impl RawOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            RawOutput::Rows(_) => "rows",
            RawOutput::Sequence(_) => "sequence",
            RawOutput::Flat(_) => "flat",
        }
    }
}

/// An opaque predictive model.
pub trait Backend {
    /// A short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether the backend's output is already in physical units.
    fn scaling(&self) -> Scaling;

    /// Runs the model once over the given input.
    ///
    /// # Arguments
    /// * `input` - The adapter-shaped input, consumed by this call.
    ///
    /// # Returns
    /// The raw model output or an error if the input doesn't fit the model.
    fn predict(&mut self, input: ModelInput) -> Result<RawOutput>;
}
