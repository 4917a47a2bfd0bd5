//! Transaction tables and demand series

use crate::error::{ForecastError, Result};
use crate::frequency::{infer_frequency, Frequency};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Names of the columns the cleaner reads from a transaction table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Transaction timestamp
    pub timestamp: String,
    /// Units sold (numeric or coercible text)
    pub quantity: String,
    /// Price per unit (optional column)
    pub unit_price: String,
    /// Product label, possibly missing
    pub label: String,
    /// Product code used for label imputation
    pub code: String,
    /// Region or country (carried, not used for forecasting)
    pub region: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            timestamp: "InvoiceDate".to_string(),
            quantity: "Quantity".to_string(),
            unit_price: "UnitPrice".to_string(),
            label: "Description".to_string(),
            code: "StockCode".to_string(),
            region: "Country".to_string(),
        }
    }
}

/// A materialized table of raw transactions
#[derive(Debug, Clone)]
pub struct TransactionTable {
    /// Data frame holding the raw rows
    df: DataFrame,
    /// Column names
    schema: TableSchema,
}

/// Data loader for transaction tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a transaction table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, schema: TableSchema) -> Result<TransactionTable> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        TransactionTable::new(df, schema)
    }

    /// Wrap an existing DataFrame
    pub fn from_dataframe(df: DataFrame, schema: TableSchema) -> Result<TransactionTable> {
        TransactionTable::new(df, schema)
    }
}

impl TransactionTable {
    /// Create a table, checking that the required columns exist.
    ///
    /// Timestamp, quantity, label and code are required; unit price and
    /// region may be absent.
    pub fn new(df: DataFrame, schema: TableSchema) -> Result<Self> {
        {
            let names = df.get_column_names();
            for required in [
                &schema.timestamp,
                &schema.quantity,
                &schema.label,
                &schema.code,
            ] {
                if !names.contains(&required.as_str()) {
                    return Err(ForecastError::DataError(format!(
                        "Column '{}' not found in data",
                        required
                    )));
                }
            }
        }

        Ok(Self { df, schema })
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the column names
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Whether the optional unit price column is present
    pub fn has_unit_price(&self) -> bool {
        self.df
            .get_column_names()
            .contains(&self.schema.unit_price.as_str())
    }

    /// Number of raw rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}

/// Ordered demand observations for one product or for the whole catalog.
///
/// Timestamps are strictly increasing and quantities are finite and
/// non-negative. The series cannot be modified after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSeries {
    /// Product identifier, if the series belongs to one product
    product: Option<String>,
    timestamps: Vec<DateTime<Utc>>,
    quantities: Vec<f64>,
}

impl DemandSeries {
    /// Create a series, validating ordering and quantities
    pub fn new(timestamps: Vec<DateTime<Utc>>, quantities: Vec<f64>) -> Result<Self> {
        if timestamps.len() != quantities.len() {
            return Err(ForecastError::DataError(format!(
                "Timestamps length ({}) doesn't match quantities length ({})",
                timestamps.len(),
                quantities.len()
            )));
        }

        if let Some(pair) = timestamps.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ForecastError::DataError(format!(
                "Timestamps must be strictly increasing: {} is followed by {}",
                pair[0], pair[1]
            )));
        }

        if let Some(bad) = quantities.iter().find(|q| !q.is_finite() || **q < 0.0) {
            return Err(ForecastError::DataError(format!(
                "Quantities must be finite and non-negative, found {}",
                bad
            )));
        }

        Ok(Self {
            product: None,
            timestamps,
            quantities,
        })
    }

    /// Create a regularly spaced series starting at `start`
    pub fn regular(start: DateTime<Utc>, frequency: Frequency, quantities: Vec<f64>) -> Result<Self> {
        let timestamps = frequency.sequence(start, quantities.len())?;
        Self::new(timestamps, quantities)
    }

    /// Attach a product identifier
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Quantities in time order
    pub fn values(&self) -> &[f64] {
        &self.quantities
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Sum of all quantities
    pub fn total(&self) -> f64 {
        self.quantities.iter().sum()
    }

    /// Infer the spacing of the time index
    pub fn frequency(&self) -> Result<Frequency> {
        infer_frequency(&self.timestamps)
    }

    /// Get a positional slice from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.len());
        if start > end || end > self.len() {
            return Err(ForecastError::DataError(format!(
                "Slice {}..{} out of bounds for series of length {}",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            product: self.product.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            quantities: self.quantities[start..end].to_vec(),
        })
    }
}
