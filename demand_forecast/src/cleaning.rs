//! Turning raw transaction tables into gap-free demand series

use crate::data::{DemandSeries, TransactionTable};
use crate::error::{ForecastError, Result};
use crate::frequency::Frequency;
use crate::utils::date_parser;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Period that transactions are summed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    /// Calendar day, midnight UTC
    Daily,
    /// ISO week starting on Monday
    Weekly,
    /// Calendar month starting on the 1st
    #[default]
    Monthly,
}

impl Resample {
    /// Start of the period containing `ts`
    pub fn bucket(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Resample::Daily => date,
            Resample::Weekly => date
                .checked_sub_signed(Duration::days(
                    date.weekday().num_days_from_monday() as i64,
                ))
                .unwrap_or(date),
            Resample::Monthly => date.with_day(1).unwrap_or(date),
        };
        Utc.from_utc_datetime(&start.and_time(NaiveTime::default()))
    }

    /// Spacing between consecutive buckets
    pub fn frequency(&self) -> Frequency {
        match self {
            Resample::Daily => Frequency::daily(),
            Resample::Weekly => Frequency::weekly(),
            Resample::Monthly => Frequency::monthly(),
        }
    }
}

/// How products are ranked when selecting the top N
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Total units sold
    #[default]
    Quantity,
    /// Total of quantity × unit price
    Sales,
}

/// One transaction after typing and imputation
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub timestamp: DateTime<Utc>,
    /// `None` when the raw value could not be read as a number
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub label: Option<String>,
    pub code: Option<String>,
}

impl CleanRow {
    /// Quantity usable for demand: present and not a return
    fn demand(&self) -> Option<f64> {
        self.quantity.filter(|q| *q >= 0.0)
    }

    /// Derived total sales, zero when price or quantity is missing
    pub fn total_sales(&self) -> f64 {
        match (self.demand(), self.unit_price) {
            (Some(q), Some(p)) => q * p,
            _ => 0.0,
        }
    }
}

/// Counters describing one cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningSummary {
    pub rows_in: usize,
    pub missing_timestamp: usize,
    pub missing_quantity: usize,
    pub negative_quantity: usize,
    pub labels_imputed: usize,
    pub labels_missing: usize,
}

/// Typed rows plus the counters gathered while producing them
#[derive(Debug, Clone)]
pub struct CleanedRows {
    rows: Vec<CleanRow>,
    summary: CleaningSummary,
}

impl CleanedRows {
    pub fn rows(&self) -> &[CleanRow] {
        &self.rows
    }

    pub fn summary(&self) -> &CleaningSummary {
        &self.summary
    }
}

/// Demand history of one product in catalog mode
#[derive(Debug, Clone)]
pub struct ProductDemand {
    pub product: String,
    pub total_quantity: f64,
    pub total_sales: f64,
    pub series: DemandSeries,
}

/// Per-product demand series ranked by volume
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<ProductDemand>,
    summary: CleaningSummary,
}

impl Catalog {
    /// All products, highest volume first
    pub fn products(&self) -> &[ProductDemand] {
        &self.products
    }

    /// The `n` highest-volume products
    pub fn top(&self, n: usize) -> &[ProductDemand] {
        &self.products[..n.min(self.products.len())]
    }

    pub fn get(&self, product: &str) -> Option<&ProductDemand> {
        self.products.iter().find(|p| p.product == product)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn summary(&self) -> &CleaningSummary {
        &self.summary
    }
}

/// Fill missing labels from other rows sharing the same product code.
///
/// For every row with a missing label and a known code, the label of the
/// first row (in table order) with that code and a present label is used.
/// Rows with no such donor keep a missing label. The inputs are not modified.
pub fn impute_labels(codes: &[Option<String>], labels: &[Option<String>]) -> Vec<Option<String>> {
    let mut first_label: HashMap<&str, &str> = HashMap::new();
    for (code, label) in codes.iter().zip(labels) {
        if let (Some(code), Some(label)) = (code, label) {
            first_label.entry(code.as_str()).or_insert(label.as_str());
        }
    }

    codes
        .iter()
        .zip(labels)
        .map(|(code, label)| match (label, code) {
            (Some(label), _) => Some(label.clone()),
            (None, Some(code)) => first_label.get(code.as_str()).map(|l| l.to_string()),
            (None, None) => None,
        })
        .collect()
}

/// Normalizes transaction tables into demand series
#[derive(Debug, Clone, Default)]
pub struct SeriesCleaner {
    resample: Resample,
    rank_by: RankBy,
}

impl SeriesCleaner {
    pub fn new(resample: Resample) -> Self {
        Self {
            resample,
            rank_by: RankBy::default(),
        }
    }

    pub fn with_rank_by(mut self, rank_by: RankBy) -> Self {
        self.rank_by = rank_by;
        self
    }

    pub fn resample(&self) -> Resample {
        self.resample
    }

    /// Type every column, drop rows without a timestamp and impute labels.
    ///
    /// Reads `table` without modifying it.
    pub fn prepare(&self, table: &TransactionTable) -> Result<CleanedRows> {
        let df = table.dataframe();
        let schema = table.schema();

        let timestamps = timestamp_column(df.column(&schema.timestamp)?)?;
        let quantities = numeric_column(df.column(&schema.quantity)?)?;
        let prices = if table.has_unit_price() {
            numeric_column(df.column(&schema.unit_price)?)?
        } else {
            vec![None; df.height()]
        };
        let raw_labels = text_column(df.column(&schema.label)?)?;
        let raw_codes = text_column(df.column(&schema.code)?)?;

        let mut summary = CleaningSummary {
            rows_in: df.height(),
            ..Default::default()
        };

        let keep: Vec<usize> = (0..df.height())
            .filter(|&i| timestamps[i].is_some())
            .collect();
        summary.missing_timestamp = df.height() - keep.len();

        let codes: Vec<Option<String>> = keep.iter().map(|&i| raw_codes[i].clone()).collect();
        let labels: Vec<Option<String>> = keep.iter().map(|&i| raw_labels[i].clone()).collect();
        let imputed = impute_labels(&codes, &labels);

        summary.labels_imputed = labels
            .iter()
            .zip(&imputed)
            .filter(|(before, after)| before.is_none() && after.is_some())
            .count();
        summary.labels_missing = imputed.iter().filter(|l| l.is_none()).count();

        let mut rows = Vec::with_capacity(keep.len());
        for ((&i, label), code) in keep.iter().zip(imputed).zip(codes) {
            let Some(timestamp) = timestamps[i] else {
                continue;
            };
            match quantities[i] {
                None => summary.missing_quantity += 1,
                Some(q) if q < 0.0 => summary.negative_quantity += 1,
                Some(_) => {}
            }
            rows.push(CleanRow {
                timestamp,
                quantity: quantities[i],
                unit_price: prices[i],
                label,
                code,
            });
        }

        debug!(
            rows_in = summary.rows_in,
            missing_timestamp = summary.missing_timestamp,
            missing_quantity = summary.missing_quantity,
            negative_quantity = summary.negative_quantity,
            labels_imputed = summary.labels_imputed,
            "prepared transaction rows"
        );

        Ok(CleanedRows { rows, summary })
    }

    /// Clean the whole table into a single demand series
    pub fn clean(&self, table: &TransactionTable) -> Result<DemandSeries> {
        self.clean_with_summary(table).map(|(series, _)| series)
    }

    /// Clean the whole table into a single series and report what was dropped
    pub fn clean_with_summary(
        &self,
        table: &TransactionTable,
    ) -> Result<(DemandSeries, CleaningSummary)> {
        let prepared = self.prepare(table)?;
        let series = self.aggregate(prepared.rows.iter())?;
        info!(points = series.len(), "cleaned single demand series");
        Ok((series, prepared.summary))
    }

    /// Clean the table into one demand series per product label, ranked by volume
    pub fn clean_catalog(&self, table: &TransactionTable) -> Result<Catalog> {
        let prepared = self.prepare(table)?;
        if !prepared.rows.iter().any(|r| r.demand().is_some()) {
            return Err(ForecastError::DataInsufficient { needed: 1, got: 0 });
        }

        let mut grouped: BTreeMap<&str, Vec<&CleanRow>> = BTreeMap::new();
        for row in &prepared.rows {
            if let Some(label) = row.label.as_deref() {
                grouped.entry(label).or_default().push(row);
            }
        }

        let mut products = Vec::with_capacity(grouped.len());
        for (label, rows) in grouped {
            let series = match self.aggregate(rows.iter().copied()) {
                Ok(series) => series.with_product(label),
                Err(err) => {
                    debug!(product = label, error = %err, "skipping product without usable demand");
                    continue;
                }
            };
            products.push(ProductDemand {
                product: label.to_string(),
                total_quantity: series.total(),
                total_sales: rows.iter().map(|r| r.total_sales()).sum(),
                series,
            });
        }

        let rank_by = self.rank_by;
        let volume = move |p: &ProductDemand| match rank_by {
            RankBy::Quantity => p.total_quantity,
            RankBy::Sales => p.total_sales,
        };
        products.sort_by(|a, b| {
            volume(b)
                .partial_cmp(&volume(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product.cmp(&b.product))
        });

        info!(products = products.len(), "cleaned catalog");
        Ok(Catalog {
            products,
            summary: prepared.summary,
        })
    }

    /// Sum usable quantities per bucket and fill empty buckets with zero
    fn aggregate<'a>(&self, rows: impl Iterator<Item = &'a CleanRow>) -> Result<DemandSeries> {
        let mut buckets: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        for row in rows {
            if let Some(q) = row.demand() {
                *buckets.entry(self.resample.bucket(row.timestamp)).or_insert(0.0) += q;
            }
        }

        let (Some((&first, _)), Some((&last, _))) =
            (buckets.first_key_value(), buckets.last_key_value())
        else {
            return Err(ForecastError::DataInsufficient { needed: 1, got: 0 });
        };

        let frequency = self.resample.frequency();
        let mut timestamps = Vec::new();
        let mut quantities = Vec::new();
        let mut current = first;
        while current <= last {
            timestamps.push(current);
            quantities.push(buckets.get(&current).copied().unwrap_or(0.0));
            current = frequency.advance(current).ok_or_else(|| {
                ForecastError::DataError(format!("Timestamp overflow stepping past {}", current))
            })?;
        }

        DemandSeries::new(timestamps, quantities)
    }
}

/// Read a timestamp column of any supported type; unreadable cells become `None`
fn timestamp_column(series: &Series) -> Result<Vec<Option<DateTime<Utc>>>> {
    match series.dtype() {
        DataType::Datetime(unit, _) => {
            let units_per_second = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let physical = series.cast(&DataType::Int64)?;
            Ok(physical
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| date_parser::from_epoch(v, units_per_second)))
                .collect())
        }
        DataType::Date => {
            let physical = series.cast(&DataType::Int32)?;
            Ok(physical
                .i32()?
                .into_iter()
                .map(|v| v.and_then(date_parser::from_epoch_days))
                .collect())
        }
        DataType::Utf8 => Ok(series
            .utf8()?
            .into_iter()
            .map(|v| v.and_then(|text| date_parser::parse_date(text).ok()))
            .collect()),
        DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 => {
            let millis = series.cast(&DataType::Int64)?;
            Ok(millis
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| date_parser::from_epoch(v, 1_000)))
                .collect())
        }
        other => Err(ForecastError::DataError(format!(
            "Column '{}' of type {} cannot be read as timestamps",
            series.name(),
            other
        ))),
    }
}

/// Coerce a column to numbers; cells that fail coercion become `None`, not zero
fn numeric_column(series: &Series) -> Result<Vec<Option<f64>>> {
    let numeric = match series.dtype() {
        DataType::Utf8 => {
            let trimmed: Vec<Option<String>> = series
                .utf8()?
                .into_iter()
                .map(|v| v.map(|text| text.trim().to_string()))
                .collect();
            Series::new(series.name(), trimmed).cast(&DataType::Float64)?
        }
        _ => series.cast(&DataType::Float64)?,
    };

    Ok(numeric
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Convert a column to trimmed text; empty text counts as missing
fn text_column(series: &Series) -> Result<Vec<Option<String>>> {
    let text = series.cast(&DataType::Utf8)?;
    Ok(text
        .utf8()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}
