use demand_forecast::error::{FailureKind, ForecastError};
use forecast_math::MathError;
use rstest::rstest;
use std::io;
use std::time::Duration;

#[test]
fn test_error_conversion() {
    // IO errors convert directly
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);
    assert!(matches!(forecast_error, ForecastError::IoError(_)));

    // Math kernel errors keep their message
    let forecast_error = ForecastError::from(MathError::Singular("pivot 0".to_string()));
    assert!(matches!(forecast_error, ForecastError::MathError(MathError::Singular(_))));
    assert!(forecast_error.to_string().contains("pivot 0"));

    // Bad JSON is a configuration problem
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let forecast_error = ForecastError::from(json_error);
    assert!(matches!(forecast_error, ForecastError::ConfigError(_)));
}

#[test]
fn test_error_display() {
    let error = ForecastError::InvalidParameter("alpha must be in (0, 1]".to_string());
    assert!(error.to_string().contains("alpha must be in (0, 1]"));

    let error = ForecastError::InsufficientHistory {
        strategy: "ARIMA(2,1,0)".to_string(),
        needed: 4,
        got: 2,
    };
    let message = error.to_string();
    assert!(message.contains("ARIMA(2,1,0)"));
    assert!(message.contains('4'));

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let message = ForecastError::from(io_error).to_string();
    assert!(message.contains("IO error"));
    assert!(message.contains("permission denied"));
}

#[rstest]
#[case(ForecastError::DataInsufficient { needed: 13, got: 10 }, FailureKind::DataInsufficient)]
#[case(
    ForecastError::InsufficientHistory { strategy: "Linear Regression".to_string(), needed: 2, got: 1 },
    FailureKind::DataInsufficient
)]
#[case(
    ForecastError::Timeout { strategy: "Slow".to_string(), limit: Duration::from_millis(10) },
    FailureKind::DataInsufficient
)]
#[case(ForecastError::FrequencyInference("irregular".to_string()), FailureKind::FrequencyInference)]
#[case(
    ForecastError::Convergence { strategy: "ARIMA(2,1,0)".to_string(), reason: "singular".to_string() },
    FailureKind::Convergence
)]
#[case(ForecastError::EmptyComparison, FailureKind::EmptyComparison)]
#[case(ForecastError::DataError("bad".to_string()), FailureKind::Other)]
fn test_failure_kind(#[case] error: ForecastError, #[case] expected: FailureKind) {
    assert_eq!(error.kind(), expected);
}

#[test]
fn test_failure_kind_serializes_snake_case() {
    let json = serde_json::to_string(&FailureKind::FrequencyInference).unwrap();
    assert_eq!(json, "\"frequency_inference\"");
}
