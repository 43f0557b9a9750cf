use crate::{
    MlErr, Result,
    arch::Sequential,
    backend::{Backend, ModelInput, RawOutput, Scaling},
};

/// A flat-feature regressor: every input row maps to one row of physical-unit outputs.
#[derive(Clone, Debug)]
pub struct Regressor {
    net: Sequential,
}

impl Regressor {
    pub fn new(net: Sequential) -> Self {
        Self { net }
    }
}

impl Backend for Regressor {
    fn name(&self) -> &'static str {
        "regressor"
    }

    fn scaling(&self) -> Scaling {
        Scaling::SelfScaling
    }

    fn predict(&mut self, input: ModelInput) -> Result<RawOutput> {
        let got = input.kind();
        let ModelInput::Flat(x) = input else {
            return Err(MlErr::UnsupportedInput {
                backend: self.name(),
                got,
            });
        };

        Ok(RawOutput::Rows(self.net.forward(x.view())?))
    }
}
