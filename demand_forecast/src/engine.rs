//! Uniform execution of forecasting strategies
//!
//! Strategies return raw values. The engine owns the post-processing that
//! every forecast goes through: length check, finiteness check, clamping to
//! zero and attaching the forecast timestamps.

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};
use crate::models::arima::Arima;
use crate::models::exponential_smoothing::ExponentialSmoothing;
use crate::models::linear::LinearTrend;
use crate::models::neural::NeuralRegressor;
use crate::models::{ForecastModel, ForecastResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// A set of interchangeable forecasting strategies
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    strategies: Vec<Arc<dyn ForecastModel>>,
}

impl ForecastEngine {
    pub fn new(strategies: Vec<Arc<dyn ForecastModel>>) -> Self {
        Self { strategies }
    }

    /// Engine with all four strategies at their default parameters
    pub fn with_default_strategies() -> Self {
        Self::new(vec![
            Arc::new(ExponentialSmoothing::default()),
            Arc::new(Arima::default()),
            Arc::new(NeuralRegressor::default()),
            Arc::new(LinearTrend::new()),
        ])
    }

    /// Register another strategy
    pub fn add_strategy(&mut self, strategy: Arc<dyn ForecastModel>) {
        self.strategies.push(strategy);
    }

    pub fn strategies(&self) -> &[Arc<dyn ForecastModel>] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Forecast `horizon` periods with every strategy, in registration order
    pub fn forecast_all(
        &self,
        train: &DemandSeries,
        horizon: usize,
    ) -> Vec<(String, Result<ForecastResult>)> {
        self.strategies
            .iter()
            .map(|s| (s.name().to_string(), Self::forecast_with(s.as_ref(), train, horizon)))
            .collect()
    }

    /// Train `strategy` on `train` and post-process its forecast.
    ///
    /// The result has exactly `horizon` values, none of them negative.
    pub fn forecast_with(
        strategy: &dyn ForecastModel,
        train: &DemandSeries,
        horizon: usize,
    ) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }
        if train.len() < strategy.min_history() {
            return Err(ForecastError::InsufficientHistory {
                strategy: strategy.name().to_string(),
                needed: strategy.min_history(),
                got: train.len(),
            });
        }

        let trained = strategy.train(train)?;
        let raw = trained.forecast(horizon)?;

        if raw.len() != horizon {
            return Err(ForecastError::convergence(
                strategy.name(),
                format!("returned {} values for horizon {}", raw.len(), horizon),
            ));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::convergence(
                strategy.name(),
                "forecast contains non-finite values",
            ));
        }

        let (values, clamped) = clamp_negative(raw);
        if clamped > 0 {
            warn!(
                strategy = strategy.name(),
                clamped,
                "clamped negative forecast values to zero"
            );
        }

        let mut result = ForecastResult::new(strategy.name(), values);
        result.clamped = clamped;

        match (train.frequency(), train.last_timestamp()) {
            (Ok(frequency), Some(last)) => {
                let timestamps = frequency.future_timestamps(last, result.horizon())?;
                result = result.with_timestamps(timestamps)?;
            }
            (Err(err), _) => {
                debug!(strategy = strategy.name(), error = %err, "forecast left without timestamps");
            }
            (Ok(_), None) => {}
        }

        Ok(result)
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

/// Replace negative values with zero and count them
pub fn clamp_negative(values: Vec<f64>) -> (Vec<f64>, usize) {
    let clamped = values.iter().filter(|v| **v < 0.0).count();
    (values.into_iter().map(|v| v.max(0.0)).collect(), clamped)
}
