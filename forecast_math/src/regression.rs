//! Least-squares regression
//!
//! Contains:
//! - Trend line fitting (quantity against sequence position)
//! - Multi-regressor ordinary least squares via the normal equations

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// A straight line fitted against sequence position `0..n`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    slope: f64,
    intercept: f64,
    observations: usize,
}

impl TrendLine {
    /// Fit a trend line to `values`, using the index of each value as `x`
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data for a trend line. Need at least 2 points.".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (values.len() - 1) as f64 / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        if denominator.abs() < 1e-10 {
            return Err(MathError::CalculationError(
                "Cannot calculate slope: x values are too similar".to_string(),
            ));
        }

        let slope = numerator / denominator;

        Ok(Self {
            slope,
            intercept: y_mean - slope * x_mean,
            observations: values.len(),
        })
    }

    /// Value of the line at position `x`
    pub fn value_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Extrapolate `horizon` positions past the last fitted observation
    pub fn extrapolate(&self, horizon: usize) -> Vec<f64> {
        (0..horizon)
            .map(|h| self.value_at((self.observations + h) as f64))
            .collect()
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Solve `min ||X b - y||²` for `b`, where `design` holds the rows of `X`.
///
/// Returns `MathError::Singular` when `X'X` is not positive definite, which
/// happens when regressors are collinear or constant-zero.
pub fn least_squares(design: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>> {
    if design.is_empty() {
        return Err(MathError::InsufficientData(
            "Design matrix has no rows".to_string(),
        ));
    }
    if design.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but response has {}",
            design.len(),
            y.len()
        )));
    }

    let k = design[0].len();
    if k == 0 || design.iter().any(|row| row.len() != k) {
        return Err(MathError::InvalidInput(
            "Design matrix rows must share a non-zero width".to_string(),
        ));
    }
    if design.len() < k {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} rows to estimate {} coefficients, got {}",
            k,
            k,
            design.len()
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in design.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in (i + 1)..k {
            xtx[i][j] = xtx[j][i];
        }
    }

    solve_symmetric(&xtx, &xty)
}

/// Solve `A x = b` for symmetric positive definite `A` by Cholesky decomposition
fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 1e-10 * a[i][i].abs() || sum <= 0.0 {
                    return Err(MathError::Singular(format!(
                        "normal equations are not positive definite at column {}",
                        i
                    )));
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * z[j];
        }
        z[i] = sum / l[i][i];
    }

    // Back substitution: L' x = z
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Least-squares solution is not finite".to_string(),
        ));
    }

    Ok(x)
}
