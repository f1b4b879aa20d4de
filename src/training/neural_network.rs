//! Feed-forward neural network regressor
//!
//! Fully-connected ReLU hidden layers with optional inverted dropout, a single
//! linear output unit, L2 weight penalty and Adam updates over shuffled
//! mini-batches. The trailing part of the training partition is held out for
//! validation monitoring only; it never drives early stopping.

use super::config::{ModelType, NeuralNetParams};
use super::models::Regressor;
use crate::error::{Result, TabsightError};
use ndarray::{s, Array, Array1, Array2, Axis, Dimension, Zip};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Losses observed at the end of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochProgress {
    /// 1-based epoch number
    pub epoch: usize,
    pub epochs: usize,
    /// MSE over the fitted rows, normalized scale, without dropout
    pub train_loss: f64,
    /// MSE over the held-out rows, if any were held out
    pub val_loss: Option<f64>,
}

/// Callback invoked once per completed epoch
pub type EpochObserver = Box<dyn FnMut(&EpochProgress) + Send>;

/// Adam moment estimates for one parameter tensor list
#[derive(Debug, Clone)]
struct AdamState {
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
    t: i32,
}

impl AdamState {
    fn new(weights: &[Array2<f64>], biases: &[Array1<f64>]) -> Self {
        Self {
            m_w: weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            v_w: weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            m_b: biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            v_b: biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            t: 0,
        }
    }

    fn step(
        &mut self,
        weights: &mut [Array2<f64>],
        biases: &mut [Array1<f64>],
        gradients: &[(Array2<f64>, Array1<f64>)],
        learning_rate: f64,
    ) {
        self.t += 1;
        let lr_t = learning_rate * (1.0 - ADAM_BETA2.powi(self.t)).sqrt() / (1.0 - ADAM_BETA1.powi(self.t));

        for (i, (grad_w, grad_b)) in gradients.iter().enumerate() {
            adam_update(&mut weights[i], &mut self.m_w[i], &mut self.v_w[i], grad_w, lr_t);
            adam_update(&mut biases[i], &mut self.m_b[i], &mut self.v_b[i], grad_b, lr_t);
        }
    }
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    lr_t: f64,
) {
    Zip::from(param).and(m).and(v).and(grad).for_each(|p, m, v, &g| {
        *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
        *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
        *p -= lr_t * *m / (v.sqrt() + ADAM_EPSILON);
    });
}

/// Multi-layer perceptron regressor
pub struct MLPRegressor {
    params: NeuralNetParams,
    seed: u64,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    history: Vec<EpochProgress>,
    observer: Option<EpochObserver>,
    cancel: Option<Arc<AtomicBool>>,
}

impl fmt::Debug for MLPRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MLPRegressor")
            .field("params", &self.params)
            .field("seed", &self.seed)
            .field("n_features", &self.n_features)
            .field("epochs_run", &self.history.len())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl MLPRegressor {
    pub fn new(params: NeuralNetParams) -> Self {
        Self {
            params,
            seed: 42,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            history: Vec::new(),
            observer: None,
            cancel: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Receive one [`EpochProgress`] per epoch
    pub fn with_observer(mut self, observer: EpochObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Stop with [`TabsightError::Cancelled`] at the next epoch boundary once set
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn history(&self) -> &[EpochProgress] {
        &self.history
    }

    fn initialize_weights<R: Rng>(&mut self, rng: &mut R) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.params.hidden_layers);
        layer_sizes.push(1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            // He-uniform for ReLU layers
            let limit = (6.0 / n_in.max(1) as f64).sqrt();
            self.weights
                .push(Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-limit..limit)));
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Returns (activations, pre-activations, scaled dropout masks per hidden layer)
    fn forward<R: Rng>(
        &self,
        x: &Array2<f64>,
        mut dropout_rng: Option<&mut R>,
    ) -> (Vec<Array2<f64>>, Vec<Array2<f64>>, Vec<Option<Array2<f64>>>) {
        let n_layers = self.weights.len();
        let rate = self.params.dropout;
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(n_layers);
        let mut masks = Vec::with_capacity(n_layers.saturating_sub(1));

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;

            let a = if i + 1 < n_layers {
                let mut a = z.mapv(|v| v.max(0.0));
                match dropout_rng.as_deref_mut() {
                    Some(rng) if rate > 0.0 => {
                        let keep = 1.0 - rate;
                        let mask = Array2::from_shape_fn(a.raw_dim(), |_| {
                            if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 }
                        });
                        a *= &mask;
                        masks.push(Some(mask));
                    }
                    _ => masks.push(None),
                }
                a
            } else {
                z.clone()
            };

            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values, masks)
    }

    fn backward(
        &self,
        y: &Array1<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
        masks: &[Option<Array2<f64>>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.len() as f64;
        let l2 = self.params.l2;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // d/dp mean((p - y)^2)
        let y_2d = y.clone().insert_axis(Axis(1));
        let mut delta = (&activations[activations.len() - 1] - &y_2d) * (2.0 / n);

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * (2.0 * l2);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let relu_grad = z_values[i - 1].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.weights[i].t()) * relu_grad;
                if let Some(mask) = &masks[i - 1] {
                    delta *= mask;
                }
            }
        }

        gradients.reverse();
        gradients
    }

    fn predict_normalized(&self, x: &Array2<f64>) -> Array1<f64> {
        let (activations, _, _) = self.forward::<Xoshiro256PlusPlus>(x, None);
        activations[activations.len() - 1].column(0).to_owned()
    }

    fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
        x.select(Axis(0), indices)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.load(Ordering::Relaxed))
    }
}

fn mse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

impl Regressor for MLPRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(TabsightError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TabsightError::TrainingError("no training rows".to_string()));
        }

        self.n_features = x.ncols();
        self.history.clear();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        self.initialize_weights(&mut rng);

        let mut val_size = (n_samples as f64 * self.params.validation_split).floor() as usize;
        if val_size >= n_samples {
            val_size = 0;
        }
        let train_size = n_samples - val_size;

        let x_train = x.slice(s![..train_size, ..]).to_owned();
        let y_train = y.slice(s![..train_size]).to_owned();
        let x_val = x.slice(s![train_size.., ..]).to_owned();
        let y_val = y.slice(s![train_size..]).to_owned();

        let batch_size = self.params.batch_size.max(1);
        let epochs = self.params.epochs;
        let mut adam = AdamState::new(&self.weights, &self.biases);
        let mut indices: Vec<usize> = (0..train_size).collect();

        for epoch in 0..epochs {
            if self.is_cancelled() {
                debug!(epoch, "Training cancelled");
                return Err(TabsightError::Cancelled { epoch });
            }

            indices.shuffle(&mut rng);

            for batch in indices.chunks(batch_size) {
                let x_batch = Self::gather_rows(&x_train, batch);
                let y_batch = y_train.select(Axis(0), batch);

                let (activations, z_values, masks) = self.forward(&x_batch, Some(&mut rng));
                let gradients = self.backward(&y_batch, &activations, &z_values, &masks);
                adam.step(&mut self.weights, &mut self.biases, &gradients, self.params.learning_rate);
            }

            let train_loss = mse(&y_train, &self.predict_normalized(&x_train));
            let val_loss = (val_size > 0).then(|| mse(&y_val, &self.predict_normalized(&x_val)));

            if !train_loss.is_finite() || val_loss.map_or(false, |v| !v.is_finite()) {
                return Err(TabsightError::TrainingError(format!(
                    "loss diverged at epoch {}",
                    epoch + 1
                )));
            }

            let progress = EpochProgress {
                epoch: epoch + 1,
                epochs,
                train_loss,
                val_loss,
            };
            debug!(epoch = progress.epoch, epochs, train_loss, val_loss = ?val_loss, "Epoch complete");

            if let Some(observer) = self.observer.as_mut() {
                observer(&progress);
            }
            self.history.push(progress);
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.weights.is_empty() {
            return Err(TabsightError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TabsightError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(self.predict_normalized(x))
    }

    fn model_type(&self) -> ModelType {
        ModelType::NeuralNet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| {
            let t = i as f64 / 50.0 - 1.0;
            if j == 0 { t } else { (i % 7) as f64 / 3.5 - 1.0 }
        });
        let y: Array1<f64> = x.rows().into_iter().map(|row| row[0] * 1.5 + row[1] * 0.5).collect();
        (x, y)
    }

    fn small_params() -> NeuralNetParams {
        NeuralNetParams {
            hidden_layers: vec![16, 8],
            epochs: 60,
            learning_rate: 0.01,
            ..Default::default()
        }
    }

    #[test]
    fn test_mlp_learns_linear_signal() {
        let (x, y) = create_regression_data();

        let mut mlp = MLPRegressor::new(small_params());
        mlp.fit(&x, &y).unwrap();

        let predictions = mlp.predict(&x).unwrap();
        assert_eq!(predictions.len(), 100);

        let err = mse(&y, &predictions);
        let y_var = y.var(0.0);
        assert!(err < y_var, "MSE ({}) should be less than variance ({})", err, y_var);
    }

    #[test]
    fn test_one_progress_event_per_epoch() {
        let (x, y) = create_regression_data();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut mlp = MLPRegressor::new(NeuralNetParams { epochs: 5, ..small_params() })
            .with_observer(Box::new(move |p: &EpochProgress| sink.lock().unwrap().push(*p)));
        mlp.fit(&x, &y).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0].epoch, 1);
        assert_eq!(seen[4].epoch, 5);
        assert!(seen.iter().all(|p| p.val_loss.is_some()));
        assert_eq!(mlp.history().len(), 5);
    }

    #[test]
    fn test_cancel_between_epochs() {
        let (x, y) = create_regression_data();
        let cancel = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&cancel);

        let mut mlp = MLPRegressor::new(small_params())
            .with_cancel_flag(Arc::clone(&cancel))
            .with_observer(Box::new(move |p: &EpochProgress| {
                if p.epoch == 2 {
                    trigger.store(true, Ordering::Relaxed);
                }
            }));

        let err = mlp.fit(&x, &y).unwrap_err();
        assert!(matches!(err, TabsightError::Cancelled { epoch: 2 }));
    }

    #[test]
    fn test_dropout_still_trains() {
        let (x, y) = create_regression_data();
        let mut mlp = MLPRegressor::new(NeuralNetParams { dropout: 0.2, ..small_params() });
        mlp.fit(&x, &y).unwrap();

        let predictions = mlp.predict(&x).unwrap();
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_tiny_partition_skips_validation() {
        let x = ndarray::array![[0.0], [1.0]];
        let y = ndarray::array![0.0, 1.0];
        let mut mlp = MLPRegressor::new(NeuralNetParams { epochs: 3, ..small_params() });
        mlp.fit(&x, &y).unwrap();
        assert!(mlp.history().iter().all(|p| p.val_loss.is_none()));
    }

    #[test]
    fn test_overflowing_loss_is_training_error() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i + j + 1) as f64 * 1e200);
        let y = Array1::from_shape_fn(40, |i| (i + 1) as f64 * 1e200);
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);

        let mut mlp = MLPRegressor::new(NeuralNetParams { epochs: 5, ..small_params() })
            .with_observer(Box::new(move |_: &EpochProgress| *counter.lock().unwrap() += 1));

        let err = mlp.fit(&x, &y).unwrap_err();
        assert!(matches!(err, TabsightError::TrainingError(_)), "got {:?}", err);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(mlp.history().is_empty());
    }

    #[test]
    fn test_predict_unfitted() {
        let mlp = MLPRegressor::new(NeuralNetParams::default());
        assert!(matches!(
            mlp.predict(&ndarray::array![[1.0]]),
            Err(TabsightError::ModelNotFitted)
        ));
    }
}
