use super::Sigmoid;

#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu,
    Tanh,
}
use ActFn::*;

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Relu
    }

    pub fn tanh() -> Self {
        Tanh
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Sigmoid(a) => a.f(x),
            Relu => x.max(0.),
            Tanh => x.tanh(),
        }
    }
}
