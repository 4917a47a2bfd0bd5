//! # Demand Forecast
//!
//! A Rust library for comparing demand forecasting strategies on retail
//! transaction logs.
//!
//! ## Features
//!
//! - Cleaning of raw transaction tables into gap-free demand series, with
//!   label imputation by product code
//! - Positional train/holdout splitting
//! - Forecasting strategies (Holt-Winters Exponential Smoothing, ARIMA,
//!   Neural network regressor, Linear trend) behind one trait
//! - Uniform post-processing: negative forecasts are clamped to zero
//! - RMSE evaluation with end-aligned comparison
//! - A harness that ranks strategies per product, with per-product and
//!   per-strategy failure isolation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::config::HarnessConfig;
//! use demand_forecast::data::DataLoader;
//! use demand_forecast::harness::Harness;
//!
//! # fn main() -> demand_forecast::Result<()> {
//! let config = HarnessConfig::default();
//! let table = DataLoader::from_csv("transactions.csv", config.schema.clone())?;
//!
//! let harness = Harness::new(config)?;
//! let report = harness.run_catalog(&table)?;
//!
//! for product in report.evaluated() {
//!     if let Some(best) = product.best_strategy() {
//!         println!("{}: {} (RMSE {:.2})", product.product, best.strategy, best.rmse);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cleaning;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod harness;
pub mod metrics;
pub mod models;
pub mod split;
pub mod utils;

// Re-export commonly used types
pub use crate::cleaning::{Catalog, CleaningSummary, SeriesCleaner};
pub use crate::config::{HarnessConfig, StrategyConfig};
pub use crate::data::{DataLoader, DemandSeries, TableSchema, TransactionTable};
pub use crate::engine::ForecastEngine;
pub use crate::error::{FailureKind, ForecastError, Result};
pub use crate::harness::{Harness, ProductOutcome, ProductReport, Report, ReportSink};
pub use crate::metrics::{EvaluationRecord, Evaluator};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::split::{Split, Splitter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
