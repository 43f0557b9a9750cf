use machine_learning::{ModelInput, RawOutput, StandardScaler};

use super::unexpected_output;
use crate::{
    error::{ForecastError, Result},
    forecast::{CHANNELS, ForecastMatrix},
    order::EntityOrder,
    registry::EntityId,
    window::JointWindow,
};

/// The encode/decode pair of a backend that forecasts every location in a single call.
///
/// The backend works in normalized space, so both directions go through externally
/// supplied scalers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointAdapter {
    lag: usize,
    features: usize,
    horizon: usize,
}

impl JointAdapter {
    pub fn new(lag: usize, features: usize, horizon: usize) -> Self {
        Self {
            lag,
            features,
            horizon,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Normalizes the joint window into the backend's input.
    ///
    /// # Arguments
    /// * `window` - The window of every location, rows following its entity order.
    /// * `scaler` - The fitted feature scaler.
    pub fn encode(&self, window: &JointWindow, scaler: &StandardScaler) -> Result<ModelInput> {
        let (entities, lag, features) = window.features().dim();
        if entities != window.order().len() {
            return Err(ForecastError::shape(
                "joint window entities",
                entities,
                window.order().len(),
            ));
        }
        if lag != self.lag {
            return Err(ForecastError::shape("joint window lag", lag, self.lag));
        }
        if features != self.features {
            return Err(ForecastError::shape("joint window features", features, self.features));
        }
        if scaler.dim() != self.features {
            return Err(ForecastError::shape("feature scaler", scaler.dim(), self.features));
        }

        let x = scaler
            .transform(window.features().to_owned())
            .map_err(|e| ForecastError::AdapterShapeMismatch(e.to_string()))?;
        Ok(ModelInput::Joint(x))
    }

    /// De-normalizes the backend output and splits it per location.
    ///
    /// # Arguments
    /// * `raw` - The flattened `(entities, horizon, channels)` output.
    /// * `scaler` - The fitted target scaler.
    /// * `order` - The same order the input was encoded with.
    ///
    /// # Returns
    /// One forecast per entity, in the given order.
    pub fn decode(
        &self,
        raw: RawOutput,
        scaler: &StandardScaler,
        order: &EntityOrder,
    ) -> Result<Vec<(EntityId, ForecastMatrix)>> {
        let flat = match raw {
            RawOutput::Flat(flat) => flat,
            raw => return Err(unexpected_output("joint", &raw)),
        };

        let expected = order.len() * self.horizon * CHANNELS;
        if flat.len() != expected {
            return Err(ForecastError::shape("joint output values", flat.len(), expected));
        }
        if scaler.dim() != CHANNELS {
            return Err(ForecastError::shape("target scaler", scaler.dim(), CHANNELS));
        }

        let tensor = flat
            .into_shape_with_order((order.len(), self.horizon, CHANNELS))
            .map_err(|e| ForecastError::AdapterShapeMismatch(e.to_string()))?;
        let tensor = scaler
            .inverse_transform(tensor)
            .map_err(|e| ForecastError::AdapterShapeMismatch(e.to_string()))?;

        order
            .split(&tensor)?
            .into_iter()
            .map(|(id, slice)| Ok((id, ForecastMatrix::new(slice, self.horizon)?)))
            .collect()
    }
}
