mod backend;
mod forecast;

pub use backend::{
    BackendConfig, DEFAULT_FLAT_LAG, DEFAULT_HORIZON, DEFAULT_JOINT_LAG, DEFAULT_LOCATION_COLUMN,
    DEFAULT_SEQUENCE_LAG, JointConfig, PerEntityConfig,
};
pub use forecast::{DEFAULT_FEATURES, DEFAULT_STEP_MINUTES, DEFAULT_WIND_COLUMN, ForecastConfig};
