use ndarray::Array2;

use crate::{
    MlErr, Result,
    arch::{
        Sequential,
        layers::{Dense, Gru, LayerNorm},
    },
    backend::{Backend, ModelInput, RawOutput, Scaling},
    scaler::StandardScaler,
};

/// A per-location recurrent model.
///
/// The flattened window is layer-normalized and unrolled through a stack of GRU layers. The
/// static seed never enters the sequence: it goes through its own network whose output becomes
/// the first GRU's initial hidden state. A dense head maps every step to the output channels,
/// which are de-normalized with the model's embedded label scaler.
#[derive(Clone, Debug)]
pub struct Recurrent {
    seq_len: usize,
    input_size: usize,
    norm: LayerNorm,
    seed: Sequential,
    grus: Vec<Gru>,
    head: Dense,
    label_scaler: StandardScaler,
}

impl Recurrent {
    pub fn new(
        seq_len: usize,
        input_size: usize,
        norm: LayerNorm,
        seed: Sequential,
        grus: Vec<Gru>,
        head: Dense,
        label_scaler: StandardScaler,
    ) -> Result<Self> {
        let check = |what: &'static str, got: usize, expected: usize| {
            if got == expected {
                Ok(())
            } else {
                Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected,
                })
            }
        };

        check("recurrent input norm", norm.dim(), seq_len * input_size)?;

        let Some(first) = grus.first() else {
            return Err(MlErr::InvalidArtifact(
                "a recurrent model needs at least one gru layer".into(),
            ));
        };

        check("first gru input", first.input_size(), input_size)?;
        check(
            "seed network output",
            seed.output_size().unwrap_or_default(),
            first.hidden_size(),
        )?;

        for pair in grus.windows(2) {
            check("stacked gru input", pair[1].input_size(), pair[0].hidden_size())?;
        }

        let last_hidden = grus.last().map(Gru::hidden_size).unwrap_or_default();
        check("recurrent head input", head.dim().0, last_hidden)?;
        check("label scaler", label_scaler.dim(), head.dim().1)?;

        Ok(Self {
            seq_len,
            input_size,
            norm,
            seed,
            grus,
            head,
            label_scaler,
        })
    }
}

impl Backend for Recurrent {
    fn name(&self) -> &'static str {
        "recurrent"
    }

    fn scaling(&self) -> Scaling {
        Scaling::SelfScaling
    }

    /// Returns the whole de-normalized output sequence, one step per input step.
    fn predict(&mut self, input: ModelInput) -> Result<RawOutput> {
        let got = input.kind();
        let ModelInput::Sequence { x, seed } = input else {
            return Err(MlErr::UnsupportedInput {
                backend: self.name(),
                got,
            });
        };

        let (m, steps, features) = x.dim();
        if steps != self.seq_len {
            return Err(MlErr::SizeMismatch {
                what: "sequence length",
                got: steps,
                expected: self.seq_len,
            });
        }
        if features != self.input_size {
            return Err(MlErr::SizeMismatch {
                what: "sequence features",
                got: features,
                expected: self.input_size,
            });
        }
        if seed.nrows() != m {
            return Err(MlErr::SizeMismatch {
                what: "static seeds",
                got: seed.nrows(),
                expected: m,
            });
        }

        let flat = x.to_shape((m, steps * features))?;
        let x = self
            .norm
            .forward(flat.view())?
            .into_shape_with_order((m, steps, features))?;

        let h0: Array2<f32> = self.seed.forward(seed.view())?;

        let Some((first, rest)) = self.grus.split_first() else {
            return Err(MlErr::InvalidArtifact("missing gru layers".into()));
        };

        let mut h = first.forward(x.view(), Some(h0.view()))?;
        for gru in rest {
            h = gru.forward(h.view(), None)?;
        }

        let hidden = h.dim().2;
        let y = self
            .head
            .forward(h.into_shape_with_order((m * steps, hidden))?.view())?;
        let y = self.label_scaler.inverse_transform(y)?;
        let channels = y.ncols();

        Ok(RawOutput::Sequence(
            y.into_shape_with_order((m, steps, channels))?,
        ))
    }
}
