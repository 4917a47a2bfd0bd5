//! Multi-layer perceptron regressor over sequence position
//!
//! The only input feature is the position of each observation, scaled so
//! the training window spans [0, 1]. Forecasting feeds positions past 1.
//! Calendar effects are ignored entirely. A poor fit is not an error: the
//! network then tends to extrapolate a near-constant line.

use crate::data::DemandSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ensure_history, ForecastModel, TrainedForecastModel};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use statrs::statistics::Statistics;
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Neural network regressor of quantity on time
#[derive(Debug, Clone)]
pub struct NeuralRegressor {
    /// Name of the model
    name: String,
    /// Width of each hidden layer
    hidden_layers: Vec<usize>,
    /// Training epoch cap
    max_iter: usize,
    learning_rate: f64,
    /// Minimum loss improvement that counts as progress
    tolerance: f64,
    /// Epochs without progress before stopping early
    n_iter_no_change: usize,
    /// Fixed seed for weight initialization; entropy when `None`
    seed: Option<u64>,
}

/// Trained neural regressor
#[derive(Debug, Clone)]
pub struct TrainedNeuralRegressor {
    name: String,
    /// `None` when the training series had zero variance
    network: Option<Mlp>,
    mean: f64,
    std_dev: f64,
    n: usize,
    epochs: usize,
    loss: f64,
}

#[derive(Debug, Clone)]
struct Layer {
    /// `weights[out][in]`
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Mlp {
    layers: Vec<Layer>,
}

/// Adam moment estimates, shaped like the network
#[derive(Debug, Clone)]
struct Moments {
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
}

impl NeuralRegressor {
    /// Create a regressor with the given hidden layer widths
    pub fn new(hidden_layers: Vec<usize>) -> Result<Self> {
        if hidden_layers.is_empty() || hidden_layers.iter().any(|&w| w == 0) {
            return Err(ForecastError::InvalidParameter(
                "Hidden layers must be non-empty with positive widths".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Neural Network {:?}", hidden_layers),
            hidden_layers,
            max_iter: 500,
            learning_rate: 0.01,
            tolerance: 1e-6,
            n_iter_no_change: 20,
            seed: None,
        })
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Result<Self> {
        if max_iter == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_iter must be positive".to_string(),
            ));
        }
        self.max_iter = max_iter;
        Ok(self)
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Result<Self> {
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                learning_rate
            )));
        }
        self.learning_rate = learning_rate;
        Ok(self)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !(tolerance >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn hidden_layers(&self) -> &[usize] {
        &self.hidden_layers
    }

    fn initialize(&self, rng: &mut StdRng) -> Result<Mlp> {
        let mut sizes = vec![1];
        sizes.extend(&self.hidden_layers);
        sizes.push(1);

        let mut layers = Vec::with_capacity(sizes.len() - 1);
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let normal = Normal::new(0.0, (2.0 / fan_in as f64).sqrt())
                .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
            layers.push(Layer {
                weights: (0..fan_out)
                    .map(|_| (0..fan_in).map(|_| normal.sample(rng)).collect())
                    .collect(),
                biases: vec![0.0; fan_out],
            });
        }

        Ok(Mlp { layers })
    }

    /// Full-batch Adam on mean squared error. Returns (epochs, final loss).
    fn fit(&self, mlp: &mut Mlp, inputs: &[f64], targets: &[f64]) -> (usize, f64) {
        let mut first = Moments::zeros_like(mlp);
        let mut second = Moments::zeros_like(mlp);
        let mut best_loss = f64::INFINITY;
        let mut stalled = 0;
        let mut loss = f64::INFINITY;
        let mut epochs = 0;

        for epoch in 1..=self.max_iter {
            epochs = epoch;
            let (current, grads) = mlp.gradients(inputs, targets);
            loss = current;

            let step = epoch as i32;
            let correction1 = 1.0 - BETA1.powi(step);
            let correction2 = 1.0 - BETA2.powi(step);
            for (l, layer) in mlp.layers.iter_mut().enumerate() {
                for (o, row) in layer.weights.iter_mut().enumerate() {
                    for (i, w) in row.iter_mut().enumerate() {
                        let g = grads.weights[l][o][i];
                        let m = &mut first.weights[l][o][i];
                        let v = &mut second.weights[l][o][i];
                        *m = BETA1 * *m + (1.0 - BETA1) * g;
                        *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                        *w -= self.learning_rate * (*m / correction1)
                            / ((*v / correction2).sqrt() + EPSILON);
                    }
                }
                for (o, b) in layer.biases.iter_mut().enumerate() {
                    let g = grads.biases[l][o];
                    let m = &mut first.biases[l][o];
                    let v = &mut second.biases[l][o];
                    *m = BETA1 * *m + (1.0 - BETA1) * g;
                    *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                    *b -= self.learning_rate * (*m / correction1)
                        / ((*v / correction2).sqrt() + EPSILON);
                }
            }

            if loss > best_loss - self.tolerance {
                stalled += 1;
                if stalled >= self.n_iter_no_change {
                    break;
                }
            } else {
                stalled = 0;
            }
            best_loss = best_loss.min(loss);
        }

        (epochs, loss)
    }
}

impl Default for NeuralRegressor {
    fn default() -> Self {
        Self {
            name: "Neural Network [64]".to_string(),
            hidden_layers: vec![64],
            max_iter: 500,
            learning_rate: 0.01,
            tolerance: 1e-6,
            n_iter_no_change: 20,
            seed: None,
        }
    }
}

impl Moments {
    fn zeros_like(mlp: &Mlp) -> Self {
        Self {
            weights: mlp
                .layers
                .iter()
                .map(|l| l.weights.iter().map(|row| vec![0.0; row.len()]).collect())
                .collect(),
            biases: mlp.layers.iter().map(|l| vec![0.0; l.biases.len()]).collect(),
        }
    }
}

impl Mlp {
    /// Activations of every layer, input first. Hidden layers use ReLU.
    fn activations(&self, x: f64) -> Vec<Vec<f64>> {
        let mut activations = vec![vec![x]];
        let last = self.layers.len() - 1;
        for (l, layer) in self.layers.iter().enumerate() {
            let input = &activations[l];
            let output: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.biases)
                .map(|(row, b)| {
                    let z = b + row.iter().zip(input).map(|(w, a)| w * a).sum::<f64>();
                    if l == last {
                        z
                    } else {
                        z.max(0.0)
                    }
                })
                .collect();
            activations.push(output);
        }
        activations
    }

    fn predict(&self, x: f64) -> f64 {
        self.activations(x)
            .last()
            .and_then(|out| out.first().copied())
            .unwrap_or(0.0)
    }

    /// Mean squared error and its gradient over the whole batch
    fn gradients(&self, inputs: &[f64], targets: &[f64]) -> (f64, Moments) {
        let mut grads = Moments::zeros_like(self);
        let n = inputs.len() as f64;
        let mut loss = 0.0;

        for (&x, &y) in inputs.iter().zip(targets) {
            let activations = self.activations(x);
            let output = activations[self.layers.len()][0];
            let error = output - y;
            loss += error * error / n;

            let mut delta = vec![2.0 * error / n];
            for l in (0..self.layers.len()).rev() {
                let input = &activations[l];
                for (o, d) in delta.iter().enumerate() {
                    grads.biases[l][o] += d;
                    for (i, a) in input.iter().enumerate() {
                        grads.weights[l][o][i] += d * a;
                    }
                }

                if l > 0 {
                    let layer = &self.layers[l];
                    delta = (0..input.len())
                        .map(|i| {
                            if input[i] <= 0.0 {
                                return 0.0;
                            }
                            delta
                                .iter()
                                .enumerate()
                                .map(|(o, d)| d * layer.weights[o][i])
                                .sum()
                        })
                        .collect();
                }
            }
        }

        (loss, grads)
    }
}

impl ForecastModel for NeuralRegressor {
    fn train(&self, data: &DemandSeries) -> Result<Box<dyn TrainedForecastModel>> {
        ensure_history(&self.name, self.min_history(), data)?;

        let values = data.values();
        let n = values.len();
        let mean = values.mean();
        let std_dev = values.population_std_dev();

        if !(std_dev > 1e-12) {
            return Ok(Box::new(TrainedNeuralRegressor {
                name: self.name.clone(),
                network: None,
                mean,
                std_dev: 0.0,
                n,
                epochs: 0,
                loss: 0.0,
            }));
        }

        let scale = (n - 1) as f64;
        let inputs: Vec<f64> = (0..n).map(|i| i as f64 / scale).collect();
        let targets: Vec<f64> = values.iter().map(|v| (v - mean) / std_dev).collect();

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut network = self.initialize(&mut rng)?;
        let (epochs, loss) = self.fit(&mut network, &inputs, &targets);
        debug!(strategy = %self.name, epochs, loss, "trained neural regressor");

        Ok(Box::new(TrainedNeuralRegressor {
            name: self.name.clone(),
            network: Some(network),
            mean,
            std_dev,
            n,
            epochs,
            loss,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        4
    }
}

impl TrainedNeuralRegressor {
    /// Epochs run before stopping
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Final training loss on the standardized scale
    pub fn loss(&self) -> f64 {
        self.loss
    }
}

impl TrainedForecastModel for TrainedNeuralRegressor {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let Some(network) = &self.network else {
            return Ok(vec![self.mean; horizon]);
        };

        let scale = (self.n - 1) as f64;
        Ok((0..horizon)
            .map(|h| {
                let x = (self.n + h) as f64 / scale;
                network.predict(x) * self.std_dev + self.mean
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
