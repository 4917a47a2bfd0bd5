//! Orchestration of clean, split, forecast and evaluate into a report
//!
//! Per product the harness splits the series, forecasts with every strategy
//! and evaluates each forecast. Failures in those stages are recorded with
//! their [`Stage`]: strategy failures against the strategy, split failures
//! against the product. Load and clean failures are returned as errors, so
//! only a table with no usable demand at all aborts a run.

use crate::cleaning::CleaningSummary;
use crate::config::HarnessConfig;
use crate::data::{DemandSeries, TransactionTable};
use crate::engine::ForecastEngine;
use crate::error::{FailureKind, ForecastError, Result};
use crate::metrics::{EvaluationRecord, Evaluator};
use crate::models::{ForecastModel, ForecastResult};
use crate::split::Splitter;
use serde::Serialize;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, info_span, warn};

/// Name used for the series in single-series mode
pub const ALL_PRODUCTS: &str = "all products";

/// Per-product stage where an isolated failure was caught
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Split,
    Forecast,
    Evaluate,
}

/// A caught failure and where it happened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl FailureRecord {
    pub fn new(stage: Stage, error: &ForecastError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of one strategy on one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub forecast: Option<ForecastResult>,
    pub evaluation: Option<EvaluationRecord>,
    pub failure: Option<FailureRecord>,
}

impl StrategyOutcome {
    fn evaluated(forecast: ForecastResult, evaluation: EvaluationRecord) -> Self {
        Self {
            strategy: forecast.strategy().to_string(),
            forecast: Some(forecast),
            evaluation: Some(evaluation),
            failure: None,
        }
    }

    fn failed(strategy: &str, forecast: Option<ForecastResult>, failure: FailureRecord) -> Self {
        Self {
            strategy: strategy.to_string(),
            forecast,
            evaluation: None,
            failure: Some(failure),
        }
    }

    pub fn rmse(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.rmse)
    }

    pub fn is_success(&self) -> bool {
        self.evaluation.is_some()
    }
}

/// Evaluations of every strategy on one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReport {
    pub product: String,
    pub train_len: usize,
    pub holdout_len: usize,
    pub outcomes: Vec<StrategyOutcome>,
}

impl ProductReport {
    pub fn outcome(&self, strategy: &str) -> Option<&StrategyOutcome> {
        self.outcomes.iter().find(|o| o.strategy == strategy)
    }

    /// Successful evaluations by ascending RMSE, ties by strategy name
    pub fn ranking(&self) -> Vec<&EvaluationRecord> {
        let mut records: Vec<&EvaluationRecord> =
            self.outcomes.iter().filter_map(|o| o.evaluation.as_ref()).collect();
        records.sort_by(|a, b| {
            a.rmse
                .total_cmp(&b.rmse)
                .then_with(|| a.strategy.cmp(&b.strategy))
        });
        records
    }

    /// Strategy with the lowest RMSE
    pub fn best_strategy(&self) -> Option<&EvaluationRecord> {
        self.ranking().into_iter().next()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &FailureRecord)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.failure.as_ref().map(|f| (o.strategy.as_str(), f)))
    }
}

/// Report entry for one product
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProductOutcome {
    Evaluated(ProductReport),
    Failed {
        product: String,
        failure: FailureRecord,
    },
}

impl ProductOutcome {
    pub fn product(&self) -> &str {
        match self {
            ProductOutcome::Evaluated(report) => &report.product,
            ProductOutcome::Failed { product, .. } => product,
        }
    }

    pub fn report(&self) -> Option<&ProductReport> {
        match self {
            ProductOutcome::Evaluated(report) => Some(report),
            ProductOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            ProductOutcome::Evaluated(_) => None,
            ProductOutcome::Failed { failure, .. } => Some(failure),
        }
    }
}

/// Whether the run evaluated one aggregate series or ranked products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Single,
    Catalog,
}

/// Output of a harness run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub mode: RunMode,
    pub horizon: usize,
    pub cleaning: Option<CleaningSummary>,
    pub products: Vec<ProductOutcome>,
}

impl Report {
    pub fn product(&self, name: &str) -> Option<&ProductOutcome> {
        self.products.iter().find(|p| p.product() == name)
    }

    pub fn evaluated(&self) -> impl Iterator<Item = &ProductReport> {
        self.products.iter().filter_map(ProductOutcome::report)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProductOutcome> {
        self.products.iter().filter(|p| p.failure().is_some())
    }
}

/// Observer receiving each product's outcome as soon as it is aggregated
pub trait ReportSink {
    fn on_product(&mut self, outcome: &ProductOutcome);
}

impl<F: FnMut(&ProductOutcome)> ReportSink for F {
    fn on_product(&mut self, outcome: &ProductOutcome) {
        self(outcome)
    }
}

/// Sink that ignores every event
#[derive(Debug, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn on_product(&mut self, _outcome: &ProductOutcome) {}
}

/// Runs the evaluation pipeline
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
    engine: ForecastEngine,
    splitter: Splitter,
    evaluator: Evaluator,
}

impl Harness {
    /// Build a harness and its strategies from `config`
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let strategies = config.build_strategies()?;
        Self::with_strategies(config, strategies)
    }

    /// Build a harness that runs the given strategies instead of the configured ones
    pub fn with_strategies(
        config: HarnessConfig,
        strategies: Vec<Arc<dyn ForecastModel>>,
    ) -> Result<Self> {
        let splitter = Splitter::new(config.horizon)?;
        Ok(Self {
            config,
            engine: ForecastEngine::new(strategies),
            splitter,
            evaluator: Evaluator::default(),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn engine(&self) -> &ForecastEngine {
        &self.engine
    }

    /// Split an already clean series and evaluate every strategy on it
    pub fn evaluate_series(&self, series: &DemandSeries) -> Result<ProductReport> {
        let product = series.product().unwrap_or(ALL_PRODUCTS).to_string();
        let split = self.splitter.split(series)?;
        info!(
            product = %product,
            train = split.train().len(),
            holdout = split.holdout().len(),
            "split series"
        );

        let outcomes = self
            .engine
            .strategies()
            .iter()
            .map(|strategy| self.run_strategy(strategy, split.train(), split.holdout()))
            .collect();

        Ok(ProductReport {
            product,
            train_len: split.train().len(),
            holdout_len: split.holdout().len(),
            outcomes,
        })
    }

    /// Clean the whole table into one series and evaluate it
    pub fn run_single(&self, table: &TransactionTable) -> Result<Report> {
        self.run_single_with_sink(table, &mut NullSink)
    }

    pub fn run_single_with_sink(
        &self,
        table: &TransactionTable,
        sink: &mut dyn ReportSink,
    ) -> Result<Report> {
        let span = info_span!("product", product = ALL_PRODUCTS);
        let _guard = span.enter();

        let (series, summary) = self.config.cleaner().clean_with_summary(table)?;
        info!(points = series.len(), "cleaned");

        let outcome = self.product_outcome(ALL_PRODUCTS, &series);
        sink.on_product(&outcome);

        Ok(Report {
            mode: RunMode::Single,
            horizon: self.config.horizon,
            cleaning: Some(summary),
            products: vec![outcome],
        })
    }

    /// Evaluate the top-N products independently
    pub fn run_catalog(&self, table: &TransactionTable) -> Result<Report> {
        self.run_catalog_with_sink(table, &mut NullSink)
    }

    pub fn run_catalog_with_sink(
        &self,
        table: &TransactionTable,
        sink: &mut dyn ReportSink,
    ) -> Result<Report> {
        let catalog = self.config.cleaner().clean_catalog(table)?;
        let selected = catalog.top(self.config.top_n);
        info!(
            products = catalog.len(),
            selected = selected.len(),
            "ranked catalog"
        );

        let mut products = Vec::with_capacity(selected.len());
        for demand in selected {
            let span = info_span!("product", product = %demand.product);
            let _guard = span.enter();

            let outcome = self.product_outcome(&demand.product, &demand.series);
            sink.on_product(&outcome);
            products.push(outcome);
        }

        Ok(Report {
            mode: RunMode::Catalog,
            horizon: self.config.horizon,
            cleaning: Some(catalog.summary().clone()),
            products,
        })
    }

    fn product_outcome(&self, product: &str, series: &DemandSeries) -> ProductOutcome {
        match self.evaluate_series(series) {
            Ok(mut report) => {
                report.product = product.to_string();
                if let Some(best) = report.best_strategy() {
                    info!(strategy = %best.strategy, rmse = best.rmse, "aggregated");
                }
                ProductOutcome::Evaluated(report)
            }
            Err(err) => {
                warn!(error = %err, "product skipped");
                ProductOutcome::Failed {
                    product: product.to_string(),
                    failure: FailureRecord::new(Stage::Split, &err),
                }
            }
        }
    }

    fn run_strategy(
        &self,
        strategy: &Arc<dyn ForecastModel>,
        train: &DemandSeries,
        holdout: &DemandSeries,
    ) -> StrategyOutcome {
        let forecast = match self.forecast(strategy, train) {
            Ok(forecast) => forecast,
            Err(err) => {
                warn!(strategy = strategy.name(), error = %err, "strategy failed");
                return StrategyOutcome::failed(
                    strategy.name(),
                    None,
                    FailureRecord::new(Stage::Forecast, &err),
                );
            }
        };

        match self.evaluator.record(holdout, &forecast) {
            Ok(evaluation) => StrategyOutcome::evaluated(forecast, evaluation),
            Err(err) => {
                warn!(strategy = strategy.name(), error = %err, "evaluation failed");
                StrategyOutcome::failed(
                    strategy.name(),
                    Some(forecast),
                    FailureRecord::new(Stage::Evaluate, &err),
                )
            }
        }
    }

    /// Run one strategy, on a worker thread when a time limit is configured
    fn forecast(
        &self,
        strategy: &Arc<dyn ForecastModel>,
        train: &DemandSeries,
    ) -> Result<ForecastResult> {
        let horizon = self.config.horizon;
        match self.config.strategy_timeout() {
            None => ForecastEngine::forecast_with(strategy.as_ref(), train, horizon),
            Some(limit) => forecast_with_timeout(Arc::clone(strategy), train.clone(), horizon, limit),
        }
    }
}

/// Forecast on a worker thread and give up after `limit`.
///
/// A worker that misses the deadline is left running; its result is dropped.
fn forecast_with_timeout(
    strategy: Arc<dyn ForecastModel>,
    train: DemandSeries,
    horizon: usize,
    limit: Duration,
) -> Result<ForecastResult> {
    let name = strategy.name().to_string();
    let (tx, rx) = mpsc::channel();

    let _worker = thread::Builder::new()
        .name(format!("strategy {}", name))
        .spawn(move || {
            let _ = tx.send(ForecastEngine::forecast_with(strategy.as_ref(), &train, horizon));
        })?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ForecastError::Timeout {
            strategy: name,
            limit,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ForecastError::convergence(
            &name,
            "strategy worker stopped without a result",
        )),
    }
}
