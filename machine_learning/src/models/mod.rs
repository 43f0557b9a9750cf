mod recurrent;
mod regressor;
mod spatio_temporal;

pub use recurrent::Recurrent;
pub use regressor::Regressor;
pub use spatio_temporal::SpatioTemporal;
