//! Metrics for evaluating forecast accuracy against holdout actuals

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};
use crate::models::ForecastResult;
use forecast_math::metrics::root_mean_squared_error;
use serde::Serialize;

/// Diagnostics attached to an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationFlag {
    /// The forecast is flat while the holdout varies
    FlatForecast,
    /// The engine clamped at least one negative forecast value
    Clamped,
}

/// Score of one strategy on one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub strategy: String,
    pub rmse: f64,
    /// Number of aligned points the score was computed on
    pub horizon: usize,
    pub flags: Vec<EvaluationFlag>,
}

impl EvaluationRecord {
    pub fn has_flag(&self, flag: EvaluationFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// RMSE over the last `min(len)` points of both sequences.
///
/// The two inputs play symmetric roles.
pub fn aligned_rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    let k = actual.len().min(predicted.len());
    if k == 0 {
        return Err(ForecastError::EmptyComparison);
    }

    let actual = &actual[actual.len() - k..];
    let predicted = &predicted[predicted.len() - k..];
    Ok(root_mean_squared_error(actual, predicted)?)
}

/// Scores forecasts against holdout actuals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluator {
    /// Spread at or below which a sequence counts as flat
    flat_tolerance: f64,
}

impl Evaluator {
    pub fn new(flat_tolerance: f64) -> Result<Self> {
        if !(flat_tolerance >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "flat_tolerance must be non-negative, got {}",
                flat_tolerance
            )));
        }
        Ok(Self { flat_tolerance })
    }

    /// Root-mean-squared error of `forecast` with the holdout as ground truth.
    ///
    /// When lengths differ, the last `min(len)` points of each are compared.
    pub fn evaluate(&self, holdout: &DemandSeries, forecast: &ForecastResult) -> Result<f64> {
        aligned_rmse(holdout.values(), forecast.values())
    }

    /// Score `forecast` and attach diagnostics
    pub fn record(&self, holdout: &DemandSeries, forecast: &ForecastResult) -> Result<EvaluationRecord> {
        let rmse = self.evaluate(holdout, forecast)?;
        let k = holdout.len().min(forecast.horizon());

        let mut flags = Vec::new();
        let actual = &holdout.values()[holdout.len() - k..];
        let predicted = &forecast.values()[forecast.horizon() - k..];
        if spread(predicted) <= self.flat_tolerance && spread(actual) > self.flat_tolerance {
            flags.push(EvaluationFlag::FlatForecast);
        }
        if forecast.clamped() > 0 {
            flags.push(EvaluationFlag::Clamped);
        }

        Ok(EvaluationRecord {
            strategy: forecast.strategy().to_string(),
            rmse,
            horizon: k,
            flags,
        })
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            flat_tolerance: 1e-6,
        }
    }
}

fn spread(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    if values.is_empty() {
        0.0
    } else {
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_uses_trailing_points() {
        let rmse = aligned_rmse(&[100.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(rmse, 0.0);
    }

    #[test]
    fn test_spread_of_empty_is_zero() {
        assert_eq!(spread(&[]), 0.0);
        assert_eq!(spread(&[3.0, 7.0, 5.0]), 4.0);
    }
}
