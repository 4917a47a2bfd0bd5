use chrono::{Datelike, TimeZone, Utc};
use demand_forecast::config::{HarnessConfig, StrategyConfig};
use demand_forecast::data::{DataLoader, DemandSeries, TableSchema, TransactionTable};
use demand_forecast::error::{FailureKind, ForecastError, Result};
use demand_forecast::frequency::Frequency;
use demand_forecast::harness::{Harness, ProductOutcome, RunMode, Stage, ALL_PRODUCTS};
use demand_forecast::models::linear::LinearTrend;
use demand_forecast::models::{ForecastModel, TrainedForecastModel};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

/// One invoice line: (year, month, quantity, label)
type Line = (i32, u32, f64, &'static str);

fn table(lines: &[Line]) -> TransactionTable {
    let dates: Vec<String> = lines
        .iter()
        .map(|(y, m, _, _)| format!("{:04}-{:02}-10 09:30:00", y, m))
        .collect();
    let quantities: Vec<f64> = lines.iter().map(|l| l.2).collect();
    let labels: Vec<&str> = lines.iter().map(|l| l.3).collect();
    let codes: Vec<String> = labels.iter().map(|l| format!("SKU-{}", l)).collect();
    let prices = vec![2.5; lines.len()];
    let countries = vec!["United Kingdom"; lines.len()];

    let df = df!(
        "InvoiceDate" => dates,
        "Quantity" => quantities,
        "UnitPrice" => prices,
        "Description" => labels,
        "StockCode" => codes,
        "Country" => countries
    )
    .unwrap();
    DataLoader::from_dataframe(df, TableSchema::default()).unwrap()
}

/// `months` consecutive monthly lines for `label`, starting January 2021
fn history(label: &'static str, months: usize, quantity: impl Fn(usize) -> f64) -> Vec<Line> {
    (0..months)
        .map(|t| {
            let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
            let date = Frequency::monthly()
                .sequence(start, t + 1)
                .unwrap()
                .pop()
                .unwrap();
            (date.year(), date.month(), quantity(t), label)
        })
        .collect()
}

fn seasonal(t: usize) -> f64 {
    let pattern = [4.0, 2.0, 6.0, 10.0, 14.0, 18.0, 20.0, 17.0, 12.0, 8.0, 5.0, 3.0];
    100.0 + 1.5 * t as f64 + pattern[t % 12]
}

/// Strategy that takes longer than any sensible limit
#[derive(Debug)]
struct Slow;

#[derive(Debug)]
struct TrainedSlow;

impl ForecastModel for Slow {
    fn train(&self, _data: &DemandSeries) -> Result<Box<dyn TrainedForecastModel>> {
        thread::sleep(Duration::from_secs(3));
        Ok(Box::new(TrainedSlow))
    }

    fn name(&self) -> &str {
        "Slow"
    }

    fn min_history(&self) -> usize {
        1
    }
}

impl TrainedForecastModel for TrainedSlow {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        Ok(vec![0.0; horizon])
    }

    fn name(&self) -> &str {
        "Slow"
    }
}

#[test]
fn test_run_single_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,Country").unwrap();
    for t in 0..36 {
        let year = 2020 + t / 12;
        let month = t % 12 + 1;
        writeln!(file, "{},A,Alpha,{},{}-{:02}-03 11:00:00,1.25,France", 1000 + t, 3 + t, year, month).unwrap();
        writeln!(file, "{},B,Bravo,{},{}-{:02}-17 15:45:00,2.10,France", 2000 + t, 2 + t, year, month).unwrap();
    }
    writeln!(file, "9999,A,Alpha,-5,2020-06-01 10:00:00,1.25,France").unwrap();

    let config = HarnessConfig::default();
    let table = DataLoader::from_csv(file.path(), config.schema.clone()).unwrap();
    let report = Harness::new(config).unwrap().run_single(&table).unwrap();

    assert_eq!(report.mode, RunMode::Single);
    assert_eq!(report.products.len(), 1);
    assert_eq!(report.cleaning.as_ref().unwrap().negative_quantity, 1);

    let product = report.product(ALL_PRODUCTS).unwrap().report().unwrap();
    assert_eq!(product.train_len, 24);
    assert_eq!(product.holdout_len, 12);
    assert_eq!(product.outcomes.len(), 4);

    // 5 + 2t is an exact line
    let linear = product.outcome("Linear Regression").unwrap();
    assert!(linear.rmse().unwrap() < 1e-6);
    assert_eq!(linear.forecast.as_ref().unwrap().horizon(), 12);

    // ARIMA(2,1,0) on a straight line has a constant difference and cannot be fitted
    let arima = product.outcome("ARIMA(2,1,0)").unwrap();
    let failure = arima.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Forecast);
    assert_eq!(failure.kind, FailureKind::Convergence);

    let ranking = product.ranking();
    assert!(ranking.windows(2).all(|w| w[0].rmse <= w[1].rmse));
    assert_eq!(product.best_strategy(), ranking.first().copied());
}

#[test]
fn test_catalog_isolates_product_failures() {
    let mut lines = history("Alpha", 36, seasonal);
    lines.extend(history("Bravo", 5, |_| 3.0));
    lines.extend(history("Charlie", 2, |_| 1.0));

    let config = HarnessConfig {
        top_n: 2,
        ..HarnessConfig::default()
    };
    let report = Harness::new(config).unwrap().run_catalog(&table(&lines)).unwrap();

    assert_eq!(report.mode, RunMode::Catalog);
    let names: Vec<&str> = report.products.iter().map(|p| p.product()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo"]);

    let alpha = report.product("Alpha").unwrap().report().unwrap();
    assert_eq!(alpha.outcomes.len(), 4);
    assert!(alpha.best_strategy().is_some());

    let bravo = report.product("Bravo").unwrap().failure().unwrap();
    assert_eq!(bravo.stage, Stage::Split);
    assert_eq!(bravo.kind, FailureKind::DataInsufficient);

    assert_eq!(report.evaluated().count(), 1);
    assert_eq!(report.failed().count(), 1);
}

#[test]
fn test_strategy_failures_do_not_abort_the_product() {
    // 30 months leaves 18 for training, below the smoothing minimum of 24
    let lines = history("Alpha", 30, seasonal);
    let report = Harness::new(HarnessConfig::default())
        .unwrap()
        .run_catalog(&table(&lines))
        .unwrap();

    let alpha = report.product("Alpha").unwrap().report().unwrap();
    let smoothing = alpha.outcome("Exponential Smoothing").unwrap();
    assert!(!smoothing.is_success());
    assert_eq!(smoothing.failure.as_ref().unwrap().kind, FailureKind::DataInsufficient);

    assert!(alpha.outcome("Linear Regression").unwrap().is_success());
    assert_eq!(alpha.failures().count(), 1);
}

#[test]
fn test_no_usable_data_is_fatal() {
    let lines: Vec<Line> = vec![(2021, 1, -3.0, "Alpha"), (2021, 2, -1.0, "Alpha")];
    let harness = Harness::new(HarnessConfig::default()).unwrap();

    assert!(matches!(
        harness.run_catalog(&table(&lines)),
        Err(ForecastError::DataInsufficient { .. })
    ));
    assert!(matches!(
        harness.run_single(&table(&lines)),
        Err(ForecastError::DataInsufficient { .. })
    ));
}

#[test]
fn test_slow_strategy_times_out() {
    let config = HarnessConfig {
        strategy_timeout_secs: Some(0.5),
        ..HarnessConfig::default()
    };
    let strategies: Vec<Arc<dyn ForecastModel>> = vec![Arc::new(Slow), Arc::new(LinearTrend::new())];
    let harness = Harness::with_strategies(config, strategies).unwrap();

    let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let series = DemandSeries::regular(start, Frequency::monthly(), (0..20).map(seasonal).collect())
        .unwrap();
    let report = harness.evaluate_series(&series).unwrap();

    let slow = report.outcome("Slow").unwrap().failure.as_ref().unwrap();
    assert_eq!(slow.kind, FailureKind::DataInsufficient);
    assert!(slow.message.contains("did not finish"));
    assert!(report.outcome("Linear Regression").unwrap().is_success());
}

#[test]
fn test_report_sink_sees_every_product() {
    let mut lines = history("Alpha", 36, seasonal);
    lines.extend(history("Bravo", 4, |_| 3.0));
    let harness = Harness::new(HarnessConfig::default()).unwrap();

    let mut seen = Vec::new();
    let report = harness
        .run_catalog_with_sink(&table(&lines), &mut |outcome: &ProductOutcome| {
            seen.push(outcome.product().to_string())
        })
        .unwrap();

    assert_eq!(seen, vec!["Alpha".to_string(), "Bravo".to_string()]);
    assert_eq!(report.products.len(), 2);
}

#[test]
fn test_report_serializes_to_json() {
    let mut lines = history("Alpha", 36, seasonal);
    lines.extend(history("Bravo", 4, |_| 3.0));
    let report = Harness::new(HarnessConfig::default())
        .unwrap()
        .run_catalog(&table(&lines))
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "catalog");
    assert_eq!(json["horizon"], 12);
    assert_eq!(json["products"][0]["status"], "evaluated");
    assert_eq!(json["products"][0]["product"], "Alpha");
    assert_eq!(json["products"][1]["status"], "failed");
    assert_eq!(json["products"][1]["failure"]["stage"], "split");
    assert_eq!(json["products"][1]["failure"]["kind"], "data_insufficient");
}

#[test]
fn test_config_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{
            "horizon": 6,
            "top_n": 1,
            "resample": "monthly",
            "strategies": [
                {{"kind": "linear"}},
                {{"kind": "exponential_smoothing", "seasonal_period": 4, "smoothing_level": 0.5}}
            ]
        }}"#
    )
    .unwrap();

    let config = HarnessConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.horizon, 6);
    assert_eq!(config.strategies[0], StrategyConfig::Linear);

    let harness = Harness::new(config).unwrap();
    assert_eq!(harness.engine().len(), 2);

    let report = harness
        .run_catalog(&table(&history("Alpha", 20, seasonal)))
        .unwrap();
    let alpha = report.product("Alpha").unwrap().report().unwrap();
    assert_eq!(alpha.train_len, 14);
    assert_eq!(alpha.holdout_len, 6);
    assert!(alpha.outcomes.iter().all(|o| o.is_success()));
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(matches!(
        HarnessConfig::from_json_str("{ not json"),
        Err(ForecastError::ConfigError(_))
    ));
    assert!(matches!(
        HarnessConfig::from_json_str(r#"{"strategies": [{"kind": "prophet"}]}"#),
        Err(ForecastError::ConfigError(_))
    ));
    assert!(matches!(
        HarnessConfig::from_json_str(r#"{"horizon": 0}"#),
        Err(ForecastError::ConfigError(_))
    ));

    let config = HarnessConfig::from_json_str(
        r#"{"strategies": [{"kind": "exponential_smoothing", "smoothing_level": 1.5}]}"#,
    )
    .unwrap();
    assert!(matches!(
        Harness::new(config),
        Err(ForecastError::InvalidParameter(_))
    ));
}
