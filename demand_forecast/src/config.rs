//! Harness configuration loaded from JSON

use crate::cleaning::{RankBy, Resample, SeriesCleaner};
use crate::data::TableSchema;
use crate::error::{ForecastError, Result};
use crate::models::arima::Arima;
use crate::models::exponential_smoothing::ExponentialSmoothing;
use crate::models::linear::LinearTrend;
use crate::models::neural::NeuralRegressor;
use crate::models::ForecastModel;
use crate::split::DEFAULT_HORIZON;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Settings for one harness run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Periods held out and forecast
    pub horizon: usize,
    /// Products evaluated in catalog mode
    pub top_n: usize,
    pub rank_by: RankBy,
    pub resample: Resample,
    pub schema: TableSchema,
    /// Wall-clock limit per strategy, unlimited when absent
    pub strategy_timeout_secs: Option<f64>,
    pub strategies: Vec<StrategyConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            top_n: 5,
            rank_by: RankBy::default(),
            resample: Resample::default(),
            schema: TableSchema::default(),
            strategy_timeout_secs: None,
            strategies: StrategyConfig::defaults(),
        }
    }
}

impl HarnessConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ForecastError::ConfigError(
                "horizon must be positive".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(ForecastError::ConfigError("top_n must be positive".to_string()));
        }
        if let Some(secs) = self.strategy_timeout_secs {
            if !(secs > 0.0 && secs.is_finite()) {
                return Err(ForecastError::ConfigError(format!(
                    "strategy_timeout_secs must be positive, got {}",
                    secs
                )));
            }
        }
        if self.strategies.is_empty() {
            return Err(ForecastError::ConfigError(
                "at least one strategy is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn strategy_timeout(&self) -> Option<Duration> {
        self.strategy_timeout_secs.map(Duration::from_secs_f64)
    }

    /// Cleaner matching the resample and ranking settings
    pub fn cleaner(&self) -> SeriesCleaner {
        SeriesCleaner::new(self.resample).with_rank_by(self.rank_by)
    }

    /// Build every configured strategy, failing on the first invalid one
    pub fn build_strategies(&self) -> Result<Vec<Arc<dyn ForecastModel>>> {
        self.strategies.iter().map(StrategyConfig::build).collect()
    }
}

/// One forecasting strategy and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    ExponentialSmoothing {
        #[serde(default)]
        smoothing_level: Option<f64>,
        #[serde(default)]
        smoothing_trend: Option<f64>,
        #[serde(default)]
        smoothing_seasonal: Option<f64>,
        #[serde(default = "default_seasonal_period")]
        seasonal_period: usize,
    },
    Arima {
        #[serde(default = "default_p")]
        p: usize,
        #[serde(default = "default_d")]
        d: usize,
        #[serde(default)]
        q: usize,
        #[serde(default)]
        with_constant: bool,
    },
    Neural {
        #[serde(default = "default_hidden_layers")]
        hidden_layers: Vec<usize>,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
    Linear,
}

fn default_seasonal_period() -> usize {
    12
}

fn default_p() -> usize {
    2
}

fn default_d() -> usize {
    1
}

fn default_hidden_layers() -> Vec<usize> {
    vec![64]
}

fn default_max_iter() -> usize {
    500
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_tolerance() -> f64 {
    1e-6
}

impl StrategyConfig {
    /// All four strategies with default parameters
    pub fn defaults() -> Vec<Self> {
        vec![
            StrategyConfig::ExponentialSmoothing {
                smoothing_level: None,
                smoothing_trend: None,
                smoothing_seasonal: None,
                seasonal_period: default_seasonal_period(),
            },
            StrategyConfig::Arima {
                p: default_p(),
                d: default_d(),
                q: 0,
                with_constant: false,
            },
            StrategyConfig::Neural {
                hidden_layers: default_hidden_layers(),
                max_iter: default_max_iter(),
                learning_rate: default_learning_rate(),
                tolerance: default_tolerance(),
                seed: None,
            },
            StrategyConfig::Linear,
        ]
    }

    /// Validate the parameters and construct the strategy
    pub fn build(&self) -> Result<Arc<dyn ForecastModel>> {
        let strategy: Arc<dyn ForecastModel> = match self {
            StrategyConfig::ExponentialSmoothing {
                smoothing_level,
                smoothing_trend,
                smoothing_seasonal,
                seasonal_period,
            } => {
                let mut model = ExponentialSmoothing::new(*seasonal_period)?;
                if let Some(alpha) = smoothing_level {
                    model = model.with_smoothing_level(*alpha)?;
                }
                if let Some(beta) = smoothing_trend {
                    model = model.with_smoothing_trend(*beta)?;
                }
                if let Some(gamma) = smoothing_seasonal {
                    model = model.with_smoothing_seasonal(*gamma)?;
                }
                Arc::new(model)
            }
            StrategyConfig::Arima {
                p,
                d,
                q,
                with_constant,
            } => Arc::new(Arima::new(*p, *d, *q).with_constant(*with_constant)),
            StrategyConfig::Neural {
                hidden_layers,
                max_iter,
                learning_rate,
                tolerance,
                seed,
            } => {
                let mut model = NeuralRegressor::new(hidden_layers.clone())?
                    .with_max_iter(*max_iter)?
                    .with_learning_rate(*learning_rate)?
                    .with_tolerance(*tolerance)?;
                if let Some(seed) = seed {
                    model = model.with_seed(*seed);
                }
                Arc::new(model)
            }
            StrategyConfig::Linear => Arc::new(LinearTrend::new()),
        };
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = HarnessConfig::from_json_str("{}").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.build_strategies().unwrap().len(), 4);
    }

    #[test]
    fn test_strategy_defaults_fill_missing_fields() {
        let config: StrategyConfig = serde_json::from_str(r#"{"kind": "arima", "q": 1}"#).unwrap();
        assert_eq!(
            config,
            StrategyConfig::Arima {
                p: 2,
                d: 1,
                q: 1,
                with_constant: false
            }
        );
    }
}
