pub mod adapters;
pub mod assembler;
pub mod configs;
pub mod error;
pub mod forecast;
pub mod order;
pub mod registry;
pub mod series;
mod session;
pub mod window;

use std::path::Path;

pub use configs::{BackendConfig, ForecastConfig};
pub use error::{ForecastError, Result};
pub use registry::{EntityId, StaticRegistry};
pub use session::{RunReport, Session, Stage};

/// Runs a configured backend over every registered location.
///
/// # Arguments
/// * `config` - The path of the json configuration.
/// * `backend` - The name of the backend to run.
///
/// # Returns
/// The report of the run, or an error if the run couldn't start or the joint backend failed.
pub fn forecast<P: AsRef<Path>>(config: P, backend: &str) -> Result<RunReport> {
    let config = ForecastConfig::from_path(config)?;
    run(&config, backend)
}

/// Same as [`forecast`] over an already loaded configuration.
pub fn run(config: &ForecastConfig, backend: &str) -> Result<RunReport> {
    config.backend(backend)?;

    let registry = StaticRegistry::from_path(&config.registry)?;
    let mut session = Session::new(config, backend, &registry)?;
    session.run()
}
