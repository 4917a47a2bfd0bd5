//! Positional train/holdout split

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};

/// Number of periods held out and forecast by default
pub const DEFAULT_HORIZON: usize = 12;

/// Splits a series into a training prefix and a holdout suffix.
///
/// The split is by position. [`DemandSeries`] guarantees time order, so the
/// holdout is always the most recent `horizon` periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splitter {
    horizon: usize,
}

/// Training prefix and holdout suffix of one series
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    train: DemandSeries,
    holdout: DemandSeries,
}

impl Splitter {
    pub fn new(horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        Ok(Self { horizon })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Hold out the last `horizon` points; fails unless the series is longer
    pub fn split(&self, series: &DemandSeries) -> Result<Split> {
        if series.len() <= self.horizon {
            return Err(ForecastError::DataInsufficient {
                needed: self.horizon + 1,
                got: series.len(),
            });
        }

        let cut = series.len() - self.horizon;
        Ok(Split {
            train: series.slice(0, Some(cut))?,
            holdout: series.slice(cut, None)?,
        })
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
        }
    }
}

impl Split {
    pub fn train(&self) -> &DemandSeries {
        &self.train
    }

    pub fn holdout(&self) -> &DemandSeries {
        &self.holdout
    }

    pub fn into_parts(self) -> (DemandSeries, DemandSeries) {
        (self.train, self.holdout)
    }
}
