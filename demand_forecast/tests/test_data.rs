use chrono::{DateTime, Duration, TimeZone, Utc};
use demand_forecast::data::{DataLoader, DemandSeries, TableSchema, TransactionTable};
use demand_forecast::error::ForecastError;
use demand_forecast::frequency::{infer_frequency, Frequency};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, d, 0, 0, 0).unwrap()
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,Country").unwrap();
    writeln!(file, "536365,85123A,WHITE HANGING HEART,6,2010-12-01 08:26:00,2.55,United Kingdom").unwrap();
    writeln!(file, "536365,71053,WHITE METAL LANTERN,6,2010-12-01 08:26:00,3.39,United Kingdom").unwrap();
    writeln!(file, "536366,22633,HAND WARMER UNION JACK,6,2010-12-01 08:28:00,1.85,United Kingdom").unwrap();

    let table = DataLoader::from_csv(file.path(), TableSchema::default()).unwrap();

    assert_eq!(table.len(), 3);
    assert!(!table.is_empty());
    assert!(table.has_unit_price());
}

#[test]
fn test_missing_required_column_is_rejected() {
    let df = df!(
        "InvoiceDate" => &["2023-01-01"],
        "Quantity" => &[1.0],
        "StockCode" => &["A1"]
    )
    .unwrap();

    let err = TransactionTable::new(df, TableSchema::default()).unwrap_err();
    match err {
        ForecastError::DataError(message) => assert!(message.contains("Description")),
        other => panic!("Expected DataError, got {:?}", other),
    }
}

#[test]
fn test_optional_columns_may_be_absent() {
    let df = df!(
        "when" => &["2023-01-01"],
        "units" => &[1.0],
        "name" => &["Widget"],
        "sku" => &["A1"]
    )
    .unwrap();
    let schema = TableSchema {
        timestamp: "when".to_string(),
        quantity: "units".to_string(),
        label: "name".to_string(),
        code: "sku".to_string(),
        ..TableSchema::default()
    };

    let table = DataLoader::from_dataframe(df, schema).unwrap();
    assert!(!table.has_unit_price());
}

#[test]
fn test_demand_series_operations() {
    let series = DemandSeries::new(vec![day(1), day(2), day(3)], vec![100.0, 103.0, 106.0])
        .unwrap()
        .with_product("Widget");

    assert_eq!(series.len(), 3);
    assert!(!series.is_empty());
    assert_eq!(series.product(), Some("Widget"));
    assert_eq!(series.total(), 309.0);
    assert_eq!(series.last_timestamp(), Some(day(3)));

    let subset = series.slice(1, None).unwrap();
    assert_eq!(subset.values(), &[103.0, 106.0]);
    assert_eq!(subset.timestamps(), &[day(2), day(3)]);
    assert_eq!(subset.product(), Some("Widget"));

    assert!(series.slice(2, Some(4)).is_err());
}

#[test]
fn test_demand_series_rejects_unsorted_and_duplicate_timestamps() {
    assert!(DemandSeries::new(vec![day(2), day(1)], vec![1.0, 2.0]).is_err());
    assert!(DemandSeries::new(vec![day(1), day(1)], vec![1.0, 2.0]).is_err());
}

#[test]
fn test_demand_series_rejects_bad_quantities() {
    assert!(DemandSeries::new(vec![day(1), day(2)], vec![1.0, -2.0]).is_err());
    assert!(DemandSeries::new(vec![day(1), day(2)], vec![1.0, f64::NAN]).is_err());
    assert!(DemandSeries::new(vec![day(1)], vec![1.0, 2.0]).is_err());
}

#[test]
fn test_regular_series_frequency() {
    let start = Utc.with_ymd_and_hms(2022, 1, 31, 0, 0, 0).unwrap();
    let series = DemandSeries::regular(start, Frequency::monthly(), vec![1.0; 4]).unwrap();

    // Month ends stay on month ends
    assert_eq!(
        series.timestamps()[1],
        Utc.with_ymd_and_hms(2022, 2, 28, 0, 0, 0).unwrap()
    );
    assert_eq!(
        series.timestamps()[2],
        Utc.with_ymd_and_hms(2022, 3, 31, 0, 0, 0).unwrap()
    );
    assert_eq!(series.frequency().unwrap(), Frequency::Months(1));
}

#[test]
fn test_irregular_index_fails_inference() {
    let timestamps = vec![day(1), day(2), day(4), day(5)];
    let err = infer_frequency(&timestamps).unwrap_err();
    assert!(matches!(err, ForecastError::FrequencyInference(_)));

    let weekly = vec![day(1), day(8), day(15)];
    assert_eq!(
        infer_frequency(&weekly).unwrap(),
        Frequency::Fixed(Duration::weeks(1))
    );
}

#[test]
fn test_future_timestamps_follow_last() {
    let future = Frequency::daily().future_timestamps(day(30), 3).unwrap();
    assert_eq!(
        future,
        vec![
            day(31),
            Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 2, 2, 0, 0, 0).unwrap(),
        ]
    );
}
