//! Sampling-frequency inference for regularly spaced time indexes

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};

/// Spacing of a regular time index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Every step is exactly this long
    Fixed(Duration),
    /// Every step moves this many calendar months, keeping the day of month
    Months(u32),
}

impl Frequency {
    pub fn daily() -> Self {
        Frequency::Fixed(Duration::days(1))
    }

    pub fn weekly() -> Self {
        Frequency::Fixed(Duration::weeks(1))
    }

    pub fn monthly() -> Self {
        Frequency::Months(1)
    }

    /// The timestamp one step after `ts`
    pub fn advance(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Frequency::Fixed(step) => ts.checked_add_signed(step),
            Frequency::Months(months) if is_month_end(ts) => {
                let first = ts.date_naive().with_day(1)?;
                let end = first
                    .checked_add_months(Months::new(months + 1))?
                    .pred_opt()?;
                Some(Utc.from_utc_datetime(&end.and_time(ts.time())))
            }
            Frequency::Months(months) => ts.checked_add_months(Months::new(months)),
        }
    }

    /// `count` timestamps starting at `start` (inclusive)
    pub fn sequence(&self, start: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>> {
        let mut timestamps = Vec::with_capacity(count);
        let mut current = start;
        for i in 0..count {
            if i > 0 {
                current = self.step_after(current)?;
            }
            timestamps.push(current);
        }
        Ok(timestamps)
    }

    /// The `horizon` timestamps that follow `last`
    pub fn future_timestamps(
        &self,
        last: DateTime<Utc>,
        horizon: usize,
    ) -> Result<Vec<DateTime<Utc>>> {
        let mut timestamps = Vec::with_capacity(horizon);
        let mut current = last;
        for _ in 0..horizon {
            current = self.step_after(current)?;
            timestamps.push(current);
        }
        Ok(timestamps)
    }

    fn step_after(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.advance(ts).ok_or_else(|| {
            ForecastError::DataError(format!("Timestamp overflow stepping past {}", ts))
        })
    }
}

/// Infer the spacing of `timestamps`.
///
/// Succeeds when every consecutive gap is the same duration, or when every
/// consecutive pair is the same number of calendar months apart on the same
/// day of month (or both on the last day of their month) at the same time.
pub fn infer_frequency(timestamps: &[DateTime<Utc>]) -> Result<Frequency> {
    if timestamps.len() < 2 {
        return Err(ForecastError::FrequencyInference(format!(
            "need at least 2 timestamps, got {}",
            timestamps.len()
        )));
    }

    let first_gap = timestamps[1] - timestamps[0];
    if first_gap <= Duration::zero() {
        return Err(ForecastError::FrequencyInference(
            "timestamps are not strictly increasing".to_string(),
        ));
    }

    if timestamps.windows(2).all(|w| w[1] - w[0] == first_gap) {
        return Ok(Frequency::Fixed(first_gap));
    }

    if let Some(months) = monthly_step(timestamps) {
        return Ok(Frequency::Months(months));
    }

    let irregular = timestamps
        .windows(2)
        .find(|w| w[1] - w[0] != first_gap)
        .map(|w| format!("{} -> {}", w[0], w[1]))
        .unwrap_or_default();
    Err(ForecastError::FrequencyInference(format!(
        "irregular spacing at {}",
        irregular
    )))
}

fn month_index(ts: DateTime<Utc>) -> i64 {
    ts.year() as i64 * 12 + ts.month0() as i64
}

fn is_month_end(ts: DateTime<Utc>) -> bool {
    ts.date_naive()
        .succ_opt()
        .map_or(true, |next| next.month() != ts.month())
}

fn monthly_step(timestamps: &[DateTime<Utc>]) -> Option<u32> {
    let step = month_index(timestamps[1]) - month_index(timestamps[0]);
    if step <= 0 {
        return None;
    }

    let regular = timestamps.windows(2).all(|w| {
        let same_day = w[0].day() == w[1].day() || (is_month_end(w[0]) && is_month_end(w[1]));
        month_index(w[1]) - month_index(w[0]) == step && w[0].time() == w[1].time() && same_day
    });

    if regular {
        u32::try_from(step).ok()
    } else {
        None
    }
}
