//! Forecasting strategies for demand series

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;

/// Forecast produced by one strategy, after engine post-processing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    /// Name of the strategy that produced the forecast
    pub(crate) strategy: String,
    /// Forecasted quantities, chronological
    pub(crate) values: Vec<f64>,
    /// Timestamps continuing the training index, when it is regular
    pub(crate) timestamps: Option<Vec<DateTime<Utc>>>,
    /// How many raw values were negative and clamped to zero
    pub(crate) clamped: usize,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(strategy: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            strategy: strategy.into(),
            values,
            timestamps: None,
            clamped: 0,
        }
    }

    /// Attach forecast timestamps; their count must match the values
    pub fn with_timestamps(mut self, timestamps: Vec<DateTime<Utc>>) -> Result<Self> {
        if timestamps.len() != self.values.len() {
            return Err(ForecastError::DataError(format!(
                "Values length ({}) doesn't match timestamps length ({})",
                self.values.len(),
                timestamps.len()
            )));
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// Get the timestamps, if available
    pub fn timestamps(&self) -> Option<&[DateTime<Utc>]> {
        self.timestamps.as_deref()
    }

    /// Number of values the engine clamped to zero
    pub fn clamped(&self) -> usize {
        self.clamped
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send {
    /// Raw forecast for the `horizon` periods after the training data.
    ///
    /// Values may be negative; clamping is the engine's job.
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast strategy that can be trained on a demand series
pub trait ForecastModel: Debug + Send + Sync {
    /// Train the model on a demand series without modifying it
    fn train(&self, data: &DemandSeries) -> Result<Box<dyn TrainedForecastModel>>;

    /// Get the name of the model
    fn name(&self) -> &str;

    /// Fewest training points the model accepts
    fn min_history(&self) -> usize;
}

/// Fail with `InsufficientHistory` when `data` is shorter than `needed`
pub(crate) fn ensure_history(strategy: &str, needed: usize, data: &DemandSeries) -> Result<()> {
    if data.len() < needed {
        return Err(ForecastError::InsufficientHistory {
            strategy: strategy.to_string(),
            needed,
            got: data.len(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_unit_interval(name: &str, value: f64) -> Result<f64> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ForecastError::InvalidParameter(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )))
    }
}

pub mod arima;
pub mod exponential_smoothing;
pub mod linear;
pub mod neural;
