use ndarray::{prelude::*, s};

use crate::{MlErr, Result, arch::activations::Sigmoid};

/// A single gated recurrent unit layer unrolled over a batch of sequences.
///
/// Gates are stacked in reset, update, new order, so `w_ih` is `(3 * hidden, input)`,
/// `w_hh` is `(3 * hidden, hidden)` and both biases have `3 * hidden` elements.
#[derive(Clone, Debug)]
pub struct Gru {
    input_size: usize,
    hidden_size: usize,
    w_ih: Array2<f32>,
    w_hh: Array2<f32>,
    b_ih: Array1<f32>,
    b_hh: Array1<f32>,
}

impl Gru {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        w_ih: Vec<f32>,
        w_hh: Vec<f32>,
        b_ih: Vec<f32>,
        b_hh: Vec<f32>,
    ) -> Result<Self> {
        let gates = 3 * hidden_size;
        let shaped = |what: &'static str, raw: Vec<f32>, cols: usize| {
            let got = raw.len();
            Array2::from_shape_vec((gates, cols), raw).map_err(|_| MlErr::SizeMismatch {
                what,
                got,
                expected: gates * cols,
            })
        };

        let w_ih = shaped("gru input weights", w_ih, input_size)?;
        let w_hh = shaped("gru hidden weights", w_hh, hidden_size)?;

        for (what, bias) in [("gru input bias", &b_ih), ("gru hidden bias", &b_hh)] {
            if bias.len() != gates {
                return Err(MlErr::SizeMismatch {
                    what,
                    got: bias.len(),
                    expected: gates,
                });
            }
        }

        Ok(Self {
            input_size,
            hidden_size,
            w_ih,
            w_hh,
            b_ih: Array1::from(b_ih),
            b_hh: Array1::from(b_hh),
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Runs the layer over every step of every sequence.
    ///
    /// # Arguments
    /// * `x` - A `(batch, steps, input)` tensor.
    /// * `h0` - The initial `(batch, hidden)` state, zeros when absent.
    ///
    /// # Returns
    /// The `(batch, steps, hidden)` tensor of hidden states.
    pub fn forward(&self, x: ArrayView3<f32>, h0: Option<ArrayView2<f32>>) -> Result<Array3<f32>> {
        let (batch, steps, input) = x.dim();
        if input != self.input_size {
            return Err(MlErr::SizeMismatch {
                what: "gru input",
                got: input,
                expected: self.input_size,
            });
        }

        let hs = self.hidden_size;
        let mut h = match h0 {
            Some(h0) if h0.dim() == (batch, hs) => h0.to_owned(),
            Some(h0) => {
                return Err(MlErr::SizeMismatch {
                    what: "gru initial state",
                    got: h0.len(),
                    expected: batch * hs,
                });
            }
            None => Array2::zeros((batch, hs)),
        };

        let sigmoid = Sigmoid::new(1.);
        let mut out = Array3::zeros((batch, steps, hs));

        for t in 0..steps {
            let xt = x.index_axis(Axis(1), t);
            let gi = xt.dot(&self.w_ih.t()) + &self.b_ih;
            let gh = h.dot(&self.w_hh.t()) + &self.b_hh;

            let r = (&gi.slice(s![.., ..hs]) + &gh.slice(s![.., ..hs])).mapv_into(|v| sigmoid.f(v));
            let z = (&gi.slice(s![.., hs..2 * hs]) + &gh.slice(s![.., hs..2 * hs]))
                .mapv_into(|v| sigmoid.f(v));
            let n = (&gi.slice(s![.., 2 * hs..]) + &(&r * &gh.slice(s![.., 2 * hs..])))
                .mapv_into(f32::tanh);

            // (1 - z) * n + z * h
            h = &n + &(&z * &(&h - &n));
            out.index_axis_mut(Axis(1), t).assign(&h);
        }

        Ok(out)
    }
}
