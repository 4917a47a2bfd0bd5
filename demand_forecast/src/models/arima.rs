//! ARIMA models for demand forecasting
//!
//! AR coefficients are estimated by conditional least squares on the
//! differenced series. Models with an MA part use the Hannan-Rissanen
//! procedure: residuals from a long autoregression stand in for the
//! unobserved shocks, and the joint regression is repeated until the
//! coefficients settle.

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ensure_history, ForecastModel, TrainedForecastModel};
use forecast_math::differencing::{difference, integrate};
use forecast_math::regression::least_squares;
use forecast_math::{variance, MathError};
use tracing::debug;

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct Arima {
    /// Name of the model
    name: String,
    /// AR order (p)
    p: usize,
    /// Differencing order (d)
    d: usize,
    /// MA order (q)
    q: usize,
    /// Estimate a constant on the differenced scale
    with_constant: bool,
    /// Iteration cap for the MA refinement
    max_iter: usize,
    tolerance: f64,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArima {
    name: String,
    p: usize,
    d: usize,
    q: usize,
    constant: f64,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    /// Training data on the original scale
    original: Vec<f64>,
    /// Training data after differencing
    differenced: Vec<f64>,
    /// In-sample one-step residuals on the differenced scale
    residuals: Vec<f64>,
}

/// Coefficients in regression order: constant (optional), AR lags, MA lags
#[derive(Debug, Clone)]
struct Coefficients {
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl Arima {
    /// Create a new ARIMA(p, d, q) model without a constant
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            name: format!("ARIMA({},{},{})", p, d, q),
            p,
            d,
            q,
            with_constant: false,
            max_iter: 50,
            tolerance: 1e-6,
        }
    }

    /// Estimate a constant term (drift when d > 0)
    pub fn with_constant(mut self, with_constant: bool) -> Self {
        self.with_constant = with_constant;
        self
    }

    /// Iteration cap and tolerance for the MA refinement
    pub fn with_convergence(mut self, max_iter: usize, tolerance: f64) -> Result<Self> {
        if max_iter == 0 || !(tolerance > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "max_iter and tolerance must be positive".to_string(),
            ));
        }
        self.max_iter = max_iter;
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Order triple (p, d, q)
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    fn math_error(&self, err: MathError) -> ForecastError {
        ForecastError::convergence(&self.name, err.to_string())
    }

    /// Order of the long autoregression that seeds the MA shocks
    fn long_order(&self, observations: usize) -> usize {
        (self.p + self.q).max((observations as f64).ln().ceil() as usize)
    }

    /// Whether `m` differenced observations leave every regression with at
    /// least as many rows as coefficients
    fn can_estimate(&self, m: usize) -> bool {
        let constant = usize::from(self.with_constant);
        if self.q == 0 {
            m >= 1 && m >= 2 * self.p + constant
        } else {
            let long = self.long_order(m);
            m > 2 * long && m >= long + 2 * self.q + self.p + constant
        }
    }

    /// Regress `z[t]` on the constant, `p` lags of `z` and `q` lags of `shocks`
    fn regress(&self, z: &[f64], shocks: &[f64], start: usize) -> Result<Coefficients> {
        let mut design = Vec::with_capacity(z.len().saturating_sub(start));
        let mut response = Vec::with_capacity(design.capacity());
        for t in start..z.len() {
            let mut row = Vec::with_capacity(1 + self.p + self.q);
            if self.with_constant {
                row.push(1.0);
            }
            row.extend((1..=self.p).map(|lag| z[t - lag]));
            row.extend((1..=self.q).map(|lag| shocks[t - lag]));
            design.push(row);
            response.push(z[t]);
        }

        let beta = least_squares(&design, &response).map_err(|e| self.math_error(e))?;
        let offset = usize::from(self.with_constant);
        Ok(Coefficients {
            constant: if self.with_constant { beta[0] } else { 0.0 },
            ar: beta[offset..offset + self.p].to_vec(),
            ma: beta[offset + self.p..].to_vec(),
        })
    }

    /// Hannan-Rissanen estimation for q > 0
    fn estimate_with_ma(&self, z: &[f64]) -> Result<Coefficients> {
        let long_order = self.long_order(z.len());
        let long_ar = Arima {
            p: long_order,
            q: 0,
            with_constant: true,
            ..self.clone()
        };
        let long_fit = long_ar.regress(z, &[], long_order)?;
        let mut shocks = residuals(z, &long_fit);

        let start = long_order + self.q;
        if start >= z.len() {
            return Err(ForecastError::convergence(
                &self.name,
                "too few observations for the MA refinement",
            ));
        }

        let mut previous: Option<Vec<f64>> = None;
        for iteration in 1..=self.max_iter {
            let fit = self.regress(z, &shocks, start)?;
            let flat: Vec<f64> = std::iter::once(fit.constant)
                .chain(fit.ar.iter().copied())
                .chain(fit.ma.iter().copied())
                .collect();

            if flat.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::convergence(
                    &self.name,
                    "coefficients diverged",
                ));
            }

            let change = previous.as_ref().map(|prev| {
                prev.iter()
                    .zip(&flat)
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max)
            });
            if matches!(change, Some(c) if c < self.tolerance) {
                debug!(strategy = %self.name, iteration, "MA refinement converged");
                return Ok(fit);
            }

            shocks = residuals(z, &fit);
            previous = Some(flat);
        }

        Err(ForecastError::convergence(
            &self.name,
            format!("did not converge after {} iterations", self.max_iter),
        ))
    }
}

impl Default for Arima {
    fn default() -> Self {
        Self::new(2, 1, 0)
    }
}

/// One-step residuals of `z` under `fit`, zero before enough history exists
fn residuals(z: &[f64], fit: &Coefficients) -> Vec<f64> {
    let start = fit.ar.len().max(fit.ma.len());
    let mut shocks = vec![0.0; z.len()];
    for t in start..z.len() {
        let prediction = predict_next(z, &shocks, t, fit);
        shocks[t] = z[t] - prediction;
    }
    shocks
}

/// Prediction for position `t` from the values and shocks before it
fn predict_next(z: &[f64], shocks: &[f64], t: usize, fit: &Coefficients) -> f64 {
    let ar: f64 = fit
        .ar
        .iter()
        .enumerate()
        .map(|(i, phi)| phi * z[t - 1 - i])
        .sum();
    let ma: f64 = fit
        .ma
        .iter()
        .enumerate()
        .map(|(j, theta)| theta * shocks[t - 1 - j])
        .sum();
    fit.constant + ar + ma
}

impl ForecastModel for Arima {
    fn train(&self, data: &DemandSeries) -> Result<Box<dyn TrainedForecastModel>> {
        ensure_history(&self.name, self.min_history(), data)?;
        data.frequency()?;

        let original = data.values().to_vec();
        if variance(&original).map_or(true, |v| v < 1e-12) {
            return Err(ForecastError::convergence(&self.name, "series is constant"));
        }

        let z = difference(&original, self.d);
        let fit = if self.p == 0 && self.q == 0 {
            let constant = if self.with_constant {
                z.iter().sum::<f64>() / z.len() as f64
            } else {
                0.0
            };
            Coefficients {
                constant,
                ar: Vec::new(),
                ma: Vec::new(),
            }
        } else if self.q == 0 {
            self.regress(&z, &[], self.p)?
        } else {
            self.estimate_with_ma(&z)?
        };

        debug!(
            strategy = %self.name,
            constant = fit.constant,
            ar = ?fit.ar,
            ma = ?fit.ma,
            "estimated ARIMA coefficients"
        );

        let residuals = residuals(&z, &fit);
        Ok(Box::new(TrainedArima {
            name: self.name.clone(),
            p: self.p,
            d: self.d,
            q: self.q,
            constant: fit.constant,
            ar_coefficients: fit.ar,
            ma_coefficients: fit.ma,
            original,
            differenced: z,
            residuals,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        let differenced = (1..)
            .find(|&m| self.can_estimate(m))
            .unwrap_or(usize::MAX - self.d);
        // a single observation is always constant
        (self.d + differenced).max(2)
    }
}

impl TrainedArima {
    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }
}

impl TrainedForecastModel for TrainedArima {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let fit = Coefficients {
            constant: self.constant,
            ar: self.ar_coefficients.clone(),
            ma: self.ma_coefficients.clone(),
        };

        let mut z = self.differenced.clone();
        let mut shocks = self.residuals.clone();
        let mut future = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let t = z.len();
            let next = if t >= self.p.max(self.q) {
                predict_next(&z, &shocks, t, &fit)
            } else {
                fit.constant
            };
            z.push(next);
            // future shocks have zero expectation
            shocks.push(0.0);
            future.push(next);
        }

        let values = integrate(&future, &self.original, self.d);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::convergence(
                &self.name,
                "forecast is not finite",
            ));
        }

        Ok(values)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
