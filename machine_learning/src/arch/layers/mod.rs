mod dense;
mod gru;
mod layer;
mod layer_norm;

pub use dense::Dense;
pub use gru::Gru;
pub use layer::Layer;
pub use layer_norm::{DEFAULT_EPS, LayerNorm};
