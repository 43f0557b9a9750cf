use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use chrono::Duration;
use serde::Deserialize;

use super::BackendConfig;
use crate::{
    error::{ForecastError, Result},
    window::{ForecastSpan, WindowExtractor},
};

pub const DEFAULT_FEATURES: [&str; 8] = [
    "temperature_2m",
    "relative_humidity_2m",
    "dew_point_2m",
    "precipitation",
    "surface_pressure",
    "cloud_cover",
    "wind_speed_10m",
    "wind_direction_10m",
];
pub const DEFAULT_WIND_COLUMN: &str = "wind_direction_10m";
pub const DEFAULT_STEP_MINUTES: i64 = 60;

fn default_features() -> Vec<String> {
    DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
}

fn default_wind_column() -> String {
    DEFAULT_WIND_COLUMN.to_string()
}

fn default_step_minutes() -> i64 {
    DEFAULT_STEP_MINUTES
}

/// Everything a forecasting run needs to know, read from a json file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastConfig {
    /// The static registry csv.
    pub registry: PathBuf,
    /// The weather features fed to every backend, in order.
    #[serde(default = "default_features")]
    pub features: Vec<String>,
    #[serde(default = "default_wind_column")]
    pub wind_column: String,
    /// The spacing between consecutive observations.
    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,
    #[serde(default)]
    pub span: ForecastSpan,
    pub backends: BTreeMap<String, BackendConfig>,
}

impl ForecastConfig {
    /// Loads and validates the configuration file at `path`.
    ///
    /// Relative paths inside the file are resolved against the directory holding it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration, leaving its paths untouched.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves every relative path against `base`.
    pub fn rebase(&mut self, base: &Path) {
        if self.registry.is_relative() {
            self.registry = base.join(&self.registry);
        }
        for backend in self.backends.values_mut() {
            backend.rebase(base);
        }
    }

    /// Returns the backend registered under `name`.
    pub fn backend(&self, name: &str) -> Result<&BackendConfig> {
        self.backends.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.backends.keys().map(String::as_str).collect();
            ForecastError::InvalidConfig(format!(
                "unknown backend {name:?}, expected one of {known:?}"
            ))
        })
    }

    /// The spacing between consecutive observations, or `InvalidConfig` if it can't be
    /// represented.
    pub fn step(&self) -> Result<Duration> {
        match Duration::try_minutes(self.step_minutes) {
            Some(step) if step > Duration::zero() => Ok(step),
            _ => Err(ForecastError::InvalidConfig(format!(
                "step must be a positive, representable number of minutes, got {}",
                self.step_minutes
            ))),
        }
    }

    /// Builds the window extractor a backend needs.
    pub fn extractor(&self, backend: &BackendConfig) -> Result<WindowExtractor> {
        let wind = backend.derive_wind().then(|| self.wind_column.clone());
        Ok(WindowExtractor::new(backend.lag(), self.step()?, wind))
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Checks the configuration before any input is read.
    pub fn validate(&self) -> Result<()> {
        self.step()?;

        if self.features.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "at least one feature is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.features.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(ForecastError::InvalidConfig(format!(
                "feature {dup:?} is listed twice"
            )));
        }

        if let (Some(start), Some(end)) = (self.span.start, self.span.end) {
            if start > end {
                return Err(ForecastError::InvalidConfig(
                    "the span must start before it ends".into(),
                ));
            }
        }

        if self.backends.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "at least one backend is required".into(),
            ));
        }

        for (name, backend) in &self.backends {
            self.validate_backend(name, backend)?;
        }
        Ok(())
    }

    fn validate_backend(&self, name: &str, backend: &BackendConfig) -> Result<()> {
        if backend.lag() == 0 {
            return Err(ForecastError::InvalidConfig(format!(
                "backend {name:?}: lag must be at least 1"
            )));
        }

        if let Some(horizon) = backend.horizon() {
            if horizon == 0 || i32::try_from(horizon).is_err() {
                return Err(ForecastError::InvalidConfig(format!(
                    "backend {name:?}: horizon must be between 1 and {}, got {horizon}",
                    i32::MAX
                )));
            }
        }

        if backend.derive_wind() && !self.features.contains(&self.wind_column) {
            return Err(ForecastError::InvalidConfig(format!(
                "backend {name:?} derives wind components but {:?} isn't a feature",
                self.wind_column
            )));
        }
        Ok(())
    }
}
