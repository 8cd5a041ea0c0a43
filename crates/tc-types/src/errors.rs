use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::family::Regime;

/// Main error type for the TideCast system
#[derive(Error, Debug)]
pub enum TcError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Fit error: {0}")]
    Fit(#[from] FitError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Malformed or insufficient series data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Series {series}: timestamps not strictly increasing at index {index}")]
    NonIncreasingTimestamps { series: String, index: usize },

    #[error("Series {series}: {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        series: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Series {series}: non-finite value in {column} at index {index}")]
    NonFinite {
        series: String,
        column: String,
        index: usize,
    },

    #[error("Series {series}: split {split} is beyond series length {len}")]
    InvalidSplit { series: String, split: usize, len: usize },

    #[error("Series {series}: duplicate feature column {column}")]
    DuplicateFeature { series: String, column: String },

    #[error("Series {series}: {segment} segment is empty ({len} observations, holdout {holdout})")]
    EmptySegment {
        series: String,
        segment: String,
        len: usize,
        holdout: usize,
    },

    #[error("Timestamp overflow: {periods} steps of {step} after {last}")]
    TimestampOverflow {
        last: DateTime<Utc>,
        step: Duration,
        periods: usize,
    },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },
}

/// A model adapter could not produce (or use) a fitted state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("{family}: insufficient data, need {required} observations, have {available}")]
    InsufficientData {
        family: String,
        required: usize,
        available: usize,
    },

    #[error("{family}: did not converge: {message}")]
    NotConverged { family: String, message: String },

    #[error("Invalid hyperparameter {name}: {message}")]
    InvalidHyperparameter { name: String, message: String },

    #[error("Model has not been fitted")]
    Unfit,

    #[error("Model is in failed state: {reason}")]
    FailedState { reason: String },

    #[error("No candidate family produced a usable model for regime {regime}: {detail}")]
    NoViableCandidate { regime: Regime, detail: String },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// A metric is mathematically undefined for its inputs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("{metric}: empty input")]
    Empty { metric: String },

    #[error("{metric}: actual has {actual} values, predicted has {predicted}")]
    LengthMismatch {
        metric: String,
        actual: usize,
        predicted: usize,
    },

    #[error("{metric}: non-finite value encountered")]
    NonFinite { metric: String },

    #[error("{metric}: value {value} is below -1, log1p undefined")]
    BelowLogDomain { metric: String, value: f64 },

    #[error("{metric}: training history of {available} is too short for seasonality {seasonality}")]
    ShortHistory {
        metric: String,
        seasonality: usize,
        available: usize,
    },

    #[error("{metric}: naive baseline error is zero, scale undefined")]
    ZeroScale { metric: String },

    #[error("{metric}: actual value is zero at index {index}")]
    ZeroActual { metric: String, index: usize },
}

/// Invalid or inconsistent configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Regime {regime} has no candidate model families")]
    EmptyCandidates { regime: Regime },

    #[error("Unknown model family: {0}")]
    UnknownFamily(String),

    #[error("No search space registered for model family {family}")]
    MissingSearchSpace { family: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for TideCast operations
pub type TcResult<T> = Result<T, TcError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TcError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($field:expr, $($arg:tt)*) => {
        $crate::ConfigError::InvalidValue {
            field: $field.to_string(),
            message: format!($($arg)*),
        }
    };
}
