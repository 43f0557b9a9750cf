use std::path::{Path, PathBuf};

use machine_learning::Scaling;
use serde::Deserialize;

pub const DEFAULT_FLAT_LAG: usize = 4;
pub const DEFAULT_SEQUENCE_LAG: usize = 4;
pub const DEFAULT_JOINT_LAG: usize = 9;
pub const DEFAULT_HORIZON: usize = 3;
pub const DEFAULT_LOCATION_COLUMN: &str = "location";

/// The settings of a backend that forecasts one location at a time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerEntityConfig {
    /// The model artifact.
    pub model: PathBuf,
    /// The directory holding one `<id>.csv` series per location.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub lag: Option<usize>,
    pub derive_wind: Option<bool>,
}

/// The settings of a backend that forecasts every location in a single call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointConfig {
    /// The model artifact.
    pub model: PathBuf,
    /// The long format series of every location.
    pub input: PathBuf,
    #[serde(default = "default_location_column")]
    pub location_column: String,
    pub feature_scaler: PathBuf,
    pub target_scaler: PathBuf,
    pub output_dir: PathBuf,
    pub lag: Option<usize>,
    pub horizon: Option<usize>,
    pub derive_wind: Option<bool>,
}

fn default_location_column() -> String {
    DEFAULT_LOCATION_COLUMN.to_string()
}

/// A configured backend, tagged by the kind of adapter it needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Flat(PerEntityConfig),
    Sequence(PerEntityConfig),
    Joint(JointConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        use BackendConfig::*;

        match self {
            Flat(_) => "flat",
            Sequence(_) => "sequence",
            Joint(_) => "joint",
        }
    }

    /// The number of observations in each window.
    pub fn lag(&self) -> usize {
        use BackendConfig::*;

        match self {
            Flat(c) => c.lag.unwrap_or(DEFAULT_FLAT_LAG),
            Sequence(c) => c.lag.unwrap_or(DEFAULT_SEQUENCE_LAG),
            Joint(c) => c.lag.unwrap_or(DEFAULT_JOINT_LAG),
        }
    }

    /// Whether the wind direction is replaced with its components before windowing.
    pub fn derive_wind(&self) -> bool {
        use BackendConfig::*;

        match self {
            Flat(c) => c.derive_wind.unwrap_or(false),
            Sequence(c) => c.derive_wind.unwrap_or(true),
            Joint(c) => c.derive_wind.unwrap_or(true),
        }
    }

    /// The number of forecast steps per call, only joint backends have one.
    pub fn horizon(&self) -> Option<usize> {
        match self {
            BackendConfig::Joint(c) => Some(c.horizon.unwrap_or(DEFAULT_HORIZON)),
            _ => None,
        }
    }

    pub fn model(&self) -> &Path {
        use BackendConfig::*;

        match self {
            Flat(c) | Sequence(c) => &c.model,
            Joint(c) => &c.model,
        }
    }

    pub fn output_dir(&self) -> &Path {
        use BackendConfig::*;

        match self {
            Flat(c) | Sequence(c) => &c.output_dir,
            Joint(c) => &c.output_dir,
        }
    }

    /// The scaling the loaded backend must declare.
    pub fn scaling(&self) -> Scaling {
        match self {
            BackendConfig::Joint(_) => Scaling::ExternallyScaled,
            _ => Scaling::SelfScaling,
        }
    }

    /// Resolves every relative path against the given directory.
    pub(super) fn rebase(&mut self, base: &Path) {
        use BackendConfig::*;

        let paths: Vec<&mut PathBuf> = match self {
            Flat(c) | Sequence(c) => vec![&mut c.model, &mut c.input_dir, &mut c.output_dir],
            Joint(c) => vec![
                &mut c.model,
                &mut c.input,
                &mut c.feature_scaler,
                &mut c.target_scaler,
                &mut c.output_dir,
            ],
        };

        for path in paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
