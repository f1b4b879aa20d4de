//! Regressor trait and backend factory

use super::config::{ModelSpec, ModelType};
use super::linear_models::LinearRegression;
use super::neural_network::{EpochObserver, MLPRegressor};
use super::random_forest::RandomForest;
use crate::error::Result;
use ndarray::{Array1, Array2};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// A trainable model working on the normalized target scale
pub trait Regressor: Send {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict normalized targets. Fails with `ModelNotFitted` before `fit`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Family this backend implements
    fn model_type(&self) -> ModelType;
}

/// Hooks into a training run. Only the neural network has epochs to report on
/// or to cancel between.
#[derive(Default)]
pub struct TrainOptions {
    /// Called once per completed epoch
    pub observer: Option<EpochObserver>,
    /// Raised by the caller to stop before the next epoch
    pub cancel: Option<Arc<AtomicBool>>,
}

impl TrainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: EpochObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl std::fmt::Debug for TrainOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainOptions")
            .field("observer", &self.observer.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Map a model spec to a boxed, unfitted backend
pub fn build_regressor(spec: &ModelSpec, seed: u64, options: TrainOptions) -> Box<dyn Regressor> {
    match spec {
        ModelSpec::Linear(params) => Box::new(LinearRegression::from_params(params)),
        ModelSpec::TreeEnsemble(params) => Box::new(RandomForest::from_params(params, seed)),
        ModelSpec::NeuralNet(params) => {
            let mut mlp = MLPRegressor::new(params.clone()).with_seed(seed);
            if let Some(observer) = options.observer {
                mlp = mlp.with_observer(observer);
            }
            if let Some(cancel) = options.cancel {
                mlp = mlp.with_cancel_flag(cancel);
            }
            Box::new(mlp)
        }
    }
}
