//! Property-based tests for the forecast contract, the splitter and the evaluator.

use chrono::{TimeZone, Utc};
use demand_forecast::data::DemandSeries;
use demand_forecast::engine::ForecastEngine;
use demand_forecast::error::ForecastError;
use demand_forecast::frequency::Frequency;
use demand_forecast::metrics::{aligned_rmse, Evaluator};
use demand_forecast::models::arima::Arima;
use demand_forecast::models::exponential_smoothing::ExponentialSmoothing;
use demand_forecast::models::linear::LinearTrend;
use demand_forecast::models::neural::NeuralRegressor;
use demand_forecast::models::{ForecastModel, ForecastResult};
use demand_forecast::split::Splitter;
use proptest::prelude::*;

fn make_series(values: &[f64]) -> DemandSeries {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    DemandSeries::regular(start, Frequency::monthly(), values.to_vec()).unwrap()
}

/// Non-negative demand values, including runs of zeros
fn demand_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), 0.0..500.0_f64], min_len..max_len)
}

/// Strictly positive demand, so short prefixes are never degenerate
fn positive_demand(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..500.0_f64, len)
}

/// A series whose first differences are all equal leaves ARIMA nothing to fit
fn has_constant_differences(values: &[f64]) -> bool {
    values
        .windows(3)
        .all(|w| ((w[2] - w[1]) - (w[1] - w[0])).abs() < 1e-9)
}

fn strategies() -> Vec<Box<dyn ForecastModel>> {
    vec![
        Box::new(ExponentialSmoothing::new(4).unwrap()),
        Box::new(Arima::default()),
        Box::new(
            NeuralRegressor::new(vec![8])
                .unwrap()
                .with_max_iter(50)
                .unwrap()
                .with_seed(1),
        ),
        Box::new(LinearTrend::new()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn forecast_has_horizon_non_negative_values(
        values in demand_strategy(24, 48),
        horizon in 1usize..24,
    ) {
        let train = make_series(&values);
        for strategy in strategies() {
            match ForecastEngine::forecast_with(strategy.as_ref(), &train, horizon) {
                Ok(forecast) => {
                    prop_assert_eq!(forecast.horizon(), horizon);
                    prop_assert!(forecast.values().iter().all(|v| *v >= 0.0 && v.is_finite()));
                }
                Err(ForecastError::Convergence { .. })
                    if strategy.name().starts_with("ARIMA") && has_constant_differences(&values) => {}
                Err(other) => prop_assert!(false, "{} failed: {}", strategy.name(), other),
            }
        }
    }

    #[test]
    fn forecast_succeeds_at_minimum_history(values in positive_demand(30), horizon in 1usize..24) {
        for strategy in strategies() {
            let train = make_series(&values[..strategy.min_history()]);
            let forecast = ForecastEngine::forecast_with(strategy.as_ref(), &train, horizon);
            prop_assert!(forecast.is_ok(), "{} failed: {:?}", strategy.name(), forecast);
            prop_assert_eq!(forecast.unwrap().horizon(), horizon);
        }
    }

    #[test]
    fn split_lengths_add_up(len in 1usize..60, horizon in 1usize..24) {
        let series = make_series(&vec![1.0; len]);
        let splitter = Splitter::new(horizon).unwrap();

        match splitter.split(&series) {
            Ok(split) => {
                prop_assert!(len > horizon);
                prop_assert_eq!(split.train().len(), len - horizon);
                prop_assert_eq!(split.holdout().len(), horizon);
            }
            Err(ForecastError::DataInsufficient { .. }) => prop_assert!(len <= horizon),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn evaluating_holdout_against_itself_is_zero(values in demand_strategy(1, 30)) {
        let holdout = make_series(&values);
        let forecast = ForecastResult::new("Echo", values.clone());

        prop_assert_eq!(Evaluator::default().evaluate(&holdout, &forecast).unwrap(), 0.0);
    }

    #[test]
    fn rmse_is_symmetric_and_non_negative(
        a in demand_strategy(1, 30),
        b in demand_strategy(1, 30),
    ) {
        let ab = aligned_rmse(&a, &b).unwrap();
        let ba = aligned_rmse(&b, &a).unwrap();

        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() < 1e-12);
    }
}
