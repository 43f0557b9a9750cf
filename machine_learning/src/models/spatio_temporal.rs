use ndarray::{Array1, Axis, concatenate};

use crate::{
    MlErr, Result,
    arch::Sequential,
    backend::{Backend, ModelInput, RawOutput, Scaling},
};

/// A joint model forecasting every entity in one call.
///
/// Each entity's flattened window is concatenated with the mean window over all entities, so
/// every forecast sees the shared regional context. Inputs and outputs live in the normalized
/// space of externally supplied scalers.
#[derive(Clone, Debug)]
pub struct SpatioTemporal {
    lag: usize,
    features: usize,
    net: Sequential,
}

impl SpatioTemporal {
    pub fn new(
        lag: usize,
        features: usize,
        horizon: usize,
        channels: usize,
        net: Sequential,
    ) -> Result<Self> {
        let expected_in = 2 * lag * features;
        let got_in = net.input_size().unwrap_or_default();
        if got_in != expected_in {
            return Err(MlErr::SizeMismatch {
                what: "spatio-temporal network input",
                got: got_in,
                expected: expected_in,
            });
        }

        let expected_out = horizon * channels;
        let got_out = net.output_size().unwrap_or_default();
        if got_out != expected_out {
            return Err(MlErr::SizeMismatch {
                what: "spatio-temporal network output",
                got: got_out,
                expected: expected_out,
            });
        }

        Ok(Self {
            lag,
            features,
            net,
        })
    }
}

impl Backend for SpatioTemporal {
    fn name(&self) -> &'static str {
        "spatio_temporal"
    }

    fn scaling(&self) -> Scaling {
        Scaling::ExternallyScaled
    }

    /// Returns an `entities * horizon * channels` tensor, entity major.
    fn predict(&mut self, input: ModelInput) -> Result<RawOutput> {
        let got = input.kind();
        let ModelInput::Joint(x) = input else {
            return Err(MlErr::UnsupportedInput {
                backend: self.name(),
                got,
            });
        };

        let (entities, lag, features) = x.dim();
        if (lag, features) != (self.lag, self.features) {
            return Err(MlErr::SizeMismatch {
                what: "joint window",
                got: lag * features,
                expected: self.lag * self.features,
            });
        }

        let width = lag * features;
        let flat = x.to_shape((entities, width))?;
        let context = flat.mean_axis(Axis(0)).ok_or(MlErr::SizeMismatch {
            what: "joint entities",
            got: 0,
            expected: 1,
        })?;
        let context = context.broadcast((entities, width)).ok_or(MlErr::SizeMismatch {
            what: "joint context",
            got: context.len(),
            expected: width,
        })?;

        let input = concatenate(Axis(1), &[flat.view(), context])?;
        let out = self.net.forward(input.view())?;

        Ok(RawOutput::Flat(out.iter().copied().collect::<Array1<f32>>()))
    }
}
