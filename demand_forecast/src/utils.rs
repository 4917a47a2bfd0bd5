//! Utility functions for the demand_forecast crate

/// Parsing of textual and numeric timestamps into UTC
pub mod date_parser {
    use crate::error::{ForecastError, Result};
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];

    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

    /// Parse a timestamp written in one of the supported layouts
    pub fn parse_date(text: &str) -> Result<DateTime<Utc>> {
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&Utc));
        }

        for format in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(Utc.from_utc_datetime(&naive));
            }
        }

        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                    return Ok(Utc.from_utc_datetime(&naive));
                }
            }
        }

        Err(ForecastError::DataError(format!(
            "Unrecognized timestamp '{}'",
            text
        )))
    }

    /// Convert an epoch offset in `units_per_second` (1_000 for milliseconds,
    /// 1_000_000 for microseconds, ...) into a UTC timestamp
    pub fn from_epoch(value: i64, units_per_second: i64) -> Option<DateTime<Utc>> {
        let secs = value.div_euclid(units_per_second);
        let remainder = value.rem_euclid(units_per_second);
        let nanos = remainder.checked_mul(1_000_000_000 / units_per_second)?;
        Utc.timestamp_opt(secs, u32::try_from(nanos).ok()?).single()
    }

    /// Convert days since 1970-01-01 into a UTC midnight timestamp
    pub fn from_epoch_days(days: i32) -> Option<DateTime<Utc>> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
        let date = epoch.checked_add_signed(Duration::days(days as i64))?;
        Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
    }

}
