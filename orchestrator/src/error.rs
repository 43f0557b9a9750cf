use std::fmt;

use machine_learning::MlErr;

/// The result type used across the forecasting layer.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// All errors that can occur while producing a forecast.
#[derive(Debug)]
pub enum ForecastError {
    /// An id or display name that the static registry doesn't know.
    UnknownEntity(String),
    /// A window can't be built, or the requested time lies outside the available data.
    InsufficientHistory(String),
    /// An encode/decode dimensional contract was violated.
    AdapterShapeMismatch(String),
    /// The backend model raised.
    BackendFailure(MlErr),
    /// Entities can't be put in a unique order for the joint backend.
    AmbiguousOrder(String),
    /// Invalid configuration, caught before any input is read.
    InvalidConfig(String),
    /// An input file is readable but malformed.
    InvalidData(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl ForecastError {
    pub(crate) fn shape(what: &str, got: usize, expected: usize) -> Self {
        Self::AdapterShapeMismatch(format!("{what}: got {got}, expected {expected}"))
    }

    /// Whether this error means the requested time can't be served from the available data.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::InsufficientHistory(_))
    }
}

impl fmt::Display for ForecastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntity(key) => write!(f, "unknown entity: {key}"),
            Self::InsufficientHistory(msg) => write!(f, "insufficient history: {msg}"),
            Self::AdapterShapeMismatch(msg) => write!(f, "adapter shape mismatch: {msg}"),
            Self::BackendFailure(e) => write!(f, "backend failure: {e}"),
            Self::AmbiguousOrder(msg) => write!(f, "ambiguous entity order: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for ForecastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BackendFailure(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for ForecastError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
