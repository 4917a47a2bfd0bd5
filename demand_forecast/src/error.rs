//! Error types for the demand_forecast crate

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Too few usable points for a split or for the input as a whole
    #[error("Data insufficient: need at least {needed} points, got {got}")]
    DataInsufficient { needed: usize, got: usize },

    /// Training series shorter than a strategy's minimum history
    #[error("Insufficient history for {strategy}: need at least {needed} points, got {got}")]
    InsufficientHistory {
        strategy: String,
        needed: usize,
        got: usize,
    },

    /// Time index is not regularly spaced
    #[error("Frequency inference error: {0}")]
    FrequencyInference(String),

    /// An iterative or least-squares fit failed
    #[error("Convergence error in {strategy}: {reason}")]
    Convergence { strategy: String, reason: String },

    /// Nothing left to compare after aligning forecast and holdout
    #[error("Empty comparison: forecast and holdout share no aligned points")]
    EmptyComparison,

    /// A strategy exceeded the harness time limit
    #[error("{strategy} did not finish within {limit:?}")]
    Timeout { strategy: String, limit: Duration },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error loading or parsing configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from the numeric kernels
    #[error("Math error: {0}")]
    MathError(#[from] forecast_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}

/// Error vocabulary used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DataInsufficient,
    FrequencyInference,
    Convergence,
    EmptyComparison,
    Other,
}

impl ForecastError {
    /// Classify this error for reporting. Timeouts count as insufficient data.
    pub fn kind(&self) -> FailureKind {
        match self {
            ForecastError::DataInsufficient { .. }
            | ForecastError::InsufficientHistory { .. }
            | ForecastError::Timeout { .. } => FailureKind::DataInsufficient,
            ForecastError::FrequencyInference(_) => FailureKind::FrequencyInference,
            ForecastError::Convergence { .. } => FailureKind::Convergence,
            ForecastError::EmptyComparison => FailureKind::EmptyComparison,
            _ => FailureKind::Other,
        }
    }

    pub(crate) fn convergence(strategy: &str, reason: impl Into<String>) -> Self {
        ForecastError::Convergence {
            strategy: strategy.to_string(),
            reason: reason.into(),
        }
    }
}
