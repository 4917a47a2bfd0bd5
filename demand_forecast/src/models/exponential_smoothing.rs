//! Holt-Winters exponential smoothing with additive trend and seasonality
//!
//! Model equations, for seasonal period `m`:
//! - Level: `l_t = α(y_t - s_{t-m}) + (1-α)(l_{t-1} + b_{t-1})`
//! - Trend: `b_t = β(l_t - l_{t-1}) + (1-β)b_{t-1}`
//! - Seasonal: `s_t = γ(y_t - l_t) + (1-γ)s_{t-m}`
//! - Forecast: `ŷ_{t+h} = l_t + h·b_t + s_{t+h-m}`

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ensure_history, ensure_unit_interval, ForecastModel, TrainedForecastModel};
use tracing::debug;

/// Candidate values for smoothing parameters left unset
const GRID: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Additive Holt-Winters model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    /// Name of the model
    name: String,
    /// Level smoothing, chosen by grid search when unset
    smoothing_level: Option<f64>,
    /// Trend smoothing, chosen by grid search when unset
    smoothing_trend: Option<f64>,
    /// Seasonal smoothing, chosen by grid search when unset
    smoothing_seasonal: Option<f64>,
    seasonal_period: usize,
}

/// Trained Holt-Winters model
#[derive(Debug, Clone)]
pub struct TrainedExponentialSmoothing {
    name: String,
    alpha: f64,
    beta: f64,
    gamma: f64,
    state: State,
    /// Training length, used to index seasonal components
    n: usize,
}

#[derive(Debug, Clone)]
struct State {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    sse: f64,
}

impl ExponentialSmoothing {
    /// Create a model with the given seasonal period
    pub fn new(seasonal_period: usize) -> Result<Self> {
        if seasonal_period < 2 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal period must be at least 2".to_string(),
            ));
        }

        Ok(Self {
            name: "Exponential Smoothing".to_string(),
            smoothing_level: None,
            smoothing_trend: None,
            smoothing_seasonal: None,
            seasonal_period,
        })
    }

    pub fn with_smoothing_level(mut self, alpha: f64) -> Result<Self> {
        self.smoothing_level = Some(ensure_unit_interval("smoothing_level", alpha)?);
        Ok(self)
    }

    pub fn with_smoothing_trend(mut self, beta: f64) -> Result<Self> {
        self.smoothing_trend = Some(ensure_unit_interval("smoothing_trend", beta)?);
        Ok(self)
    }

    pub fn with_smoothing_seasonal(mut self, gamma: f64) -> Result<Self> {
        self.smoothing_seasonal = Some(ensure_unit_interval("smoothing_seasonal", gamma)?);
        Ok(self)
    }

    pub fn seasonal_period(&self) -> usize {
        self.seasonal_period
    }

    /// Pick unset smoothing parameters by minimizing in-sample SSE
    fn choose_parameters(&self, values: &[f64]) -> (f64, f64, f64, State) {
        let candidates = |fixed: Option<f64>| -> Vec<f64> {
            match fixed {
                Some(value) => vec![value],
                None => GRID.to_vec(),
            }
        };

        let mut best: Option<(f64, f64, f64, State)> = None;
        for &alpha in &candidates(self.smoothing_level) {
            for &beta in &candidates(self.smoothing_trend) {
                for &gamma in &candidates(self.smoothing_seasonal) {
                    let state = run(values, self.seasonal_period, alpha, beta, gamma);
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, _, _, current)| state.sse < current.sse);
                    if better {
                        best = Some((alpha, beta, gamma, state));
                    }
                }
            }
        }

        // The candidate lists are never empty, so a winner always exists.
        best.unwrap_or_else(|| {
            let state = run(values, self.seasonal_period, 0.5, 0.5, 0.5);
            (0.5, 0.5, 0.5, state)
        })
    }
}

impl Default for ExponentialSmoothing {
    fn default() -> Self {
        Self {
            name: "Exponential Smoothing".to_string(),
            smoothing_level: None,
            smoothing_trend: None,
            smoothing_seasonal: None,
            seasonal_period: 12,
        }
    }
}

/// Initial level, trend and seasonal indices from the first two seasons.
///
/// The trend is the mean per-step change between the two seasons. Seasonal
/// indices are first-season deviations from that trend line, and the level
/// is the line's value at the end of the first season.
fn initialize(values: &[f64], period: usize) -> (f64, f64, Vec<f64>) {
    let m = period as f64;
    let trend = (0..period)
        .map(|i| (values[period + i] - values[i]) / m)
        .sum::<f64>()
        / m;
    let season_mean = values[..period].iter().sum::<f64>() / m;
    let center = (m - 1.0) / 2.0;

    let seasonals = values[..period]
        .iter()
        .enumerate()
        .map(|(i, y)| y - (season_mean + trend * (i as f64 - center)))
        .collect();

    (season_mean + trend * center, trend, seasonals)
}

/// Filter the series from the second season on and accumulate one-step SSE
fn run(values: &[f64], period: usize, alpha: f64, beta: f64, gamma: f64) -> State {
    let (mut level, mut trend, mut seasonals) = initialize(values, period);
    let mut sse = 0.0;

    for (t, &y) in values.iter().enumerate().skip(period) {
        let idx = t % period;
        let s = seasonals[idx];
        let error = y - (level + trend + s);
        sse += error * error;

        let previous = level;
        level = alpha * (y - s) + (1.0 - alpha) * (previous + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
        seasonals[idx] = gamma * (y - level) + (1.0 - gamma) * s;
    }

    State {
        level,
        trend,
        seasonals,
        sse,
    }
}

impl ForecastModel for ExponentialSmoothing {
    fn train(&self, data: &DemandSeries) -> Result<Box<dyn TrainedForecastModel>> {
        ensure_history(&self.name, self.min_history(), data)?;
        data.frequency()?;

        let values = data.values();
        let (alpha, beta, gamma, state) = self.choose_parameters(values);
        debug!(
            strategy = %self.name,
            alpha,
            beta,
            gamma,
            sse = state.sse,
            "fitted smoothing parameters"
        );

        Ok(Box::new(TrainedExponentialSmoothing {
            name: self.name.clone(),
            alpha,
            beta,
            gamma,
            state,
            n: values.len(),
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        2 * self.seasonal_period
    }
}

impl TrainedExponentialSmoothing {
    /// Smoothing parameters (level, trend, seasonal) used for the fit
    pub fn parameters(&self) -> (f64, f64, f64) {
        (self.alpha, self.beta, self.gamma)
    }
}

impl TrainedForecastModel for TrainedExponentialSmoothing {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let period = self.state.seasonals.len();
        Ok((1..=horizon)
            .map(|h| {
                let seasonal = self.state.seasonals[(self.n + h - 1) % period];
                self.state.level + h as f64 * self.state.trend + seasonal
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
