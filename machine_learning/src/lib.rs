pub mod arch;
pub mod artifact;
pub mod backend;
pub mod error;
pub mod models;
pub mod scaler;

pub use artifact::load_backend;
pub use backend::{Backend, ModelInput, RawOutput, Scaling};
pub use error::{MlErr, Result};
pub use scaler::StandardScaler;
