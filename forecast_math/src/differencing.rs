//! Differencing and integration for integrated (the "I" in ARIMA) models

/// Apply `order` rounds of first differencing.
///
/// Each round shortens the series by one; differencing stops early once a
/// single value is left.
pub fn difference(series: &[f64], order: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..order {
        if result.len() <= 1 {
            break;
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Undo `order` rounds of differencing for values that continue `original`.
///
/// `forecast` holds future values on the differenced scale. The result holds
/// the same future values on the scale of `original`.
pub fn integrate(forecast: &[f64], original: &[f64], order: usize) -> Vec<f64> {
    let mut result = forecast.to_vec();

    for level in (0..order).rev() {
        let anchor = difference(original, level).last().copied().unwrap_or(0.0);
        let mut running = anchor;
        for value in result.iter_mut() {
            running += *value;
            *value = running;
        }
    }

    result
}
