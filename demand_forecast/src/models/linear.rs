//! Linear trend regression against sequence position

use crate::data::DemandSeries;
use crate::error::Result;
use crate::models::{ensure_history, ForecastModel, TrainedForecastModel};
use forecast_math::regression::TrendLine;

/// Ordinary least squares of quantity on position `0..n`
#[derive(Debug, Clone)]
pub struct LinearTrend {
    /// Name of the model
    name: String,
}

/// Trained linear trend
#[derive(Debug, Clone)]
pub struct TrainedLinearTrend {
    name: String,
    line: TrendLine,
}

impl LinearTrend {
    pub fn new() -> Self {
        Self {
            name: "Linear Regression".to_string(),
        }
    }
}

impl Default for LinearTrend {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainedLinearTrend {
    pub fn slope(&self) -> f64 {
        self.line.slope()
    }

    pub fn intercept(&self) -> f64 {
        self.line.intercept()
    }
}

impl ForecastModel for LinearTrend {
    fn train(&self, data: &DemandSeries) -> Result<Box<dyn TrainedForecastModel>> {
        ensure_history(&self.name, self.min_history(), data)?;
        let line = TrendLine::fit(data.values())?;

        Ok(Box::new(TrainedLinearTrend {
            name: self.name.clone(),
            line,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        2
    }
}

impl TrainedForecastModel for TrainedLinearTrend {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        Ok(self.line.extrapolate(horizon))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
