//! Training engine: preprocessing, fitting, held-out evaluation

use super::config::{validate_columns, ModelType, TrainingConfig};
use super::metrics::MetricSet;
use super::models::{build_regressor, TrainOptions};
use crate::advisor::{self, ModelSuggestion};
use crate::data::Dataset;
use crate::error::{Result, TabsightError};
use crate::insights;
use crate::preprocessing::Preprocessor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub model_type: ModelType,
    pub metrics: MetricSet,
    /// Test-partition predictions in original target units
    pub predictions: Vec<f64>,
    /// Test-partition targets in original units
    pub actuals: Vec<f64>,
    pub feature_names: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub training_time_secs: f64,
}

impl TrainingResult {
    /// Display accuracy derived from mse and the actuals' range
    pub fn accuracy_percentage(&self) -> f64 {
        MetricSet::accuracy_percentage(&self.actuals, self.metrics.mse)
    }

    /// Plain-text performance report
    pub fn insights(&self) -> String {
        insights::report(self.model_type, &self.metrics, &self.predictions, &self.actuals)
    }
}

/// One family's entry in a comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model_type: ModelType,
    pub metrics: MetricSet,
    pub accuracy_pct: f64,
    pub training_time_secs: f64,
}

/// Runs a single configuration against a dataset
#[derive(Debug)]
pub struct TrainEngine {
    config: TrainingConfig,
    options: TrainOptions,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            options: TrainOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Validate, normalize, fit on the train partition and score the test partition
    pub fn run(self, dataset: &Dataset) -> Result<TrainingResult> {
        let TrainEngine { config, options } = self;

        if dataset.is_empty() {
            return Err(TabsightError::ValidationError("dataset has no rows".to_string()));
        }
        config.validate()?;

        let start = Instant::now();
        let model_type = config.model_type();

        info!(
            model = %model_type,
            rows = dataset.len(),
            features = config.features.len(),
            target = %config.target,
            split_ratio = config.split_ratio,
            "Starting training"
        );

        let prepared = Preprocessor::new(config.split_ratio)
            .with_coercion(config.coercion)
            .normalize(dataset, &config.target, &config.features)?;

        if prepared.constant_target {
            if config.reject_constant_target {
                return Err(TabsightError::NumericDegeneracy(format!(
                    "target '{}' is constant",
                    config.target
                )));
            }
            warn!(target = %config.target, "Target is constant; r2 will be reported as 0");
        }

        let mut model = build_regressor(&config.model, config.seed, options);
        model.fit(&prepared.x_train, &prepared.y_train)?;
        let normalized = model.predict(&prepared.x_test)?;

        ensure_finite(model_type, &normalized)?;

        let predictions = prepared.target_stats.denormalize_all(&normalized).to_vec();
        let actuals = prepared.y_test.to_vec();
        let metrics = MetricSet::compute(&actuals, &predictions)?;
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            model = %model_type,
            r2 = metrics.r2,
            rmse = metrics.rmse,
            mae = metrics.mae,
            elapsed_secs = training_time_secs,
            "Training complete"
        );

        Ok(TrainingResult {
            model_type,
            metrics,
            predictions,
            actuals,
            feature_names: config.features,
            train_rows: prepared.n_train(),
            test_rows: prepared.n_test(),
            training_time_secs,
        })
    }
}

/// Fail on the first NaN or infinite prediction
fn ensure_finite(model_type: ModelType, predictions: &Array1<f64>) -> Result<()> {
    match predictions.iter().position(|p| !p.is_finite()) {
        Some(row) => Err(TabsightError::TrainingError(format!(
            "{} produced a non-finite prediction for test row {}",
            model_type, row
        ))),
        None => Ok(()),
    }
}

/// Train one model and evaluate it on the held-out rows
pub fn train_model(dataset: &Dataset, config: &TrainingConfig) -> Result<TrainingResult> {
    train_model_with(dataset, config, TrainOptions::default())
}

/// `train_model` with progress reporting and cancellation hooks
pub fn train_model_with(
    dataset: &Dataset,
    config: &TrainingConfig,
    options: TrainOptions,
) -> Result<TrainingResult> {
    TrainEngine::new(config.clone()).with_options(options).run(dataset)
}

/// Recommend a model family, features and hyperparameters without training
pub fn get_model_suggestions(
    dataset: &Dataset,
    candidate_features: &[String],
    target: &str,
) -> Result<ModelSuggestion> {
    advisor::suggest(dataset, candidate_features, target)
}

/// Plain-text performance report for a finished run
pub fn analyze_results(
    model_type: ModelType,
    metrics: &MetricSet,
    predictions: &[f64],
    actuals: &[f64],
) -> String {
    insights::report(model_type, metrics, predictions, actuals)
}

/// Train every family with default hyperparameters on the same split,
/// best accuracy first.
pub fn compare_models(
    dataset: &Dataset,
    target: &str,
    features: &[String],
    split_ratio: f64,
) -> Result<Vec<ModelComparison>> {
    validate_columns(target, features)?;

    let mut comparisons = Vec::with_capacity(ModelType::ALL.len());
    for model_type in ModelType::ALL {
        let config = TrainingConfig::new(target, features.iter().cloned(), model_type)
            .with_split_ratio(split_ratio);
        let result = train_model(dataset, &config)?;

        comparisons.push(ModelComparison {
            model_type,
            metrics: result.metrics,
            accuracy_pct: result.accuracy_percentage(),
            training_time_secs: result.training_time_secs,
        });
    }

    comparisons.sort_by(|a, b| {
        b.accuracy_pct
            .partial_cmp(&a.accuracy_pct)
            .unwrap_or(Ordering::Equal)
    });

    Ok(comparisons)
}
