//! Training configuration

use crate::advisor::ModelSuggestion;
use crate::data::CoercionMode;
use crate::error::{Result, TabsightError};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Model family tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    /// Ordinary least squares
    Linear,
    /// Bagged regression trees
    TreeEnsemble,
    /// Feed-forward neural network
    NeuralNet,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [ModelType::Linear, ModelType::TreeEnsemble, ModelType::NeuralNet];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Linear => "linear",
            ModelType::TreeEnsemble => "tree-ensemble",
            ModelType::NeuralNet => "neural-net",
        }
    }

    /// Spec carrying this family's default hyperparameters
    pub fn default_spec(&self) -> ModelSpec {
        match self {
            ModelType::Linear => ModelSpec::Linear(LinearParams::default()),
            ModelType::TreeEnsemble => ModelSpec::TreeEnsemble(TreeEnsembleParams::default()),
            ModelType::NeuralNet => ModelSpec::NeuralNet(NeuralNetParams::default()),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = TabsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "linear_regression" | "linear-regression" => Ok(ModelType::Linear),
            "tree-ensemble" | "tree_ensemble" | "random_forest" | "random-forest" | "tree" => {
                Ok(ModelType::TreeEnsemble)
            }
            "neural-net" | "neural_net" | "neural_network" | "mlp" | "nn" => Ok(ModelType::NeuralNet),
            other => Err(TabsightError::ConfigurationError(format!(
                "unknown model type '{}' (expected linear, tree-ensemble or neural-net)",
                other
            ))),
        }
    }
}

/// Linear model hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    pub fit_intercept: bool,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { fit_intercept: true }
    }
}

/// Tree ensemble hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeEnsembleParams {
    /// Number of bagged trees, capped to [1, MAX_TREES]
    pub num_trees: usize,
    /// Maximum tree depth, capped to [1, MAX_DEPTH]
    pub tree_depth: usize,
    pub min_samples_split: usize,
}

impl TreeEnsembleParams {
    pub const MAX_TREES: usize = 500;
    pub const MAX_DEPTH: usize = 32;

    pub fn effective_num_trees(&self) -> usize {
        self.num_trees.clamp(1, Self::MAX_TREES)
    }

    pub fn effective_tree_depth(&self) -> usize {
        self.tree_depth.clamp(1, Self::MAX_DEPTH)
    }
}

impl Default for TreeEnsembleParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            tree_depth: 10,
            min_samples_split: 2,
        }
    }
}

/// Neural network hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralNetParams {
    /// Hidden layer widths, input side first
    pub hidden_layers: Vec<usize>,
    /// Dropout rate after each hidden layer, in [0, 1)
    pub dropout: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// L2 penalty on weights
    pub l2: f64,
    /// Trailing share of the training partition held out for validation
    pub validation_split: f64,
}

impl Default for NeuralNetParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            dropout: 0.0,
            learning_rate: 0.001,
            epochs: 50,
            batch_size: 32,
            l2: 0.01,
            validation_split: 0.2,
        }
    }
}

/// Model family plus its hyperparameters
///
/// Serialized as `{"type": ..., "params": {...}}`. A missing or null `params`
/// falls back to the family's defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
pub enum ModelSpec {
    Linear(LinearParams),
    TreeEnsemble(TreeEnsembleParams),
    NeuralNet(NeuralNetParams),
}

#[derive(Deserialize)]
struct RawModelSpec {
    #[serde(rename = "type")]
    model_type: ModelType,
    #[serde(default)]
    params: Option<serde_json::Value>,
}

impl<'de> Deserialize<'de> for ModelSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawModelSpec::deserialize(deserializer)?;
        let Some(params) = raw.params else {
            return Ok(raw.model_type.default_spec());
        };

        let spec = match raw.model_type {
            ModelType::Linear => serde_json::from_value(params).map(ModelSpec::Linear),
            ModelType::TreeEnsemble => serde_json::from_value(params).map(ModelSpec::TreeEnsemble),
            ModelType::NeuralNet => serde_json::from_value(params).map(ModelSpec::NeuralNet),
        };
        spec.map_err(de::Error::custom)
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelType::TreeEnsemble.default_spec()
    }
}

impl ModelSpec {
    pub fn model_type(&self) -> ModelType {
        match self {
            ModelSpec::Linear(_) => ModelType::Linear,
            ModelSpec::TreeEnsemble(_) => ModelType::TreeEnsemble,
            ModelSpec::NeuralNet(_) => ModelType::NeuralNet,
        }
    }

    /// Reject hyperparameters no backend can run with. Tree counts and depths are
    /// capped rather than rejected.
    pub fn validate(&self) -> Result<()> {
        let ModelSpec::NeuralNet(p) = self else {
            return Ok(());
        };

        let invalid = |name: &str, value: String| {
            Err(TabsightError::ConfigurationError(format!(
                "invalid neural-net parameter {} = {}",
                name, value
            )))
        };

        if p.hidden_layers.is_empty() || p.hidden_layers.contains(&0) {
            return invalid("hidden_layers", format!("{:?}", p.hidden_layers));
        }
        if !(0.0..1.0).contains(&p.dropout) {
            return invalid("dropout", p.dropout.to_string());
        }
        if !(p.learning_rate > 0.0 && p.learning_rate.is_finite()) {
            return invalid("learning_rate", p.learning_rate.to_string());
        }
        if p.epochs == 0 {
            return invalid("epochs", "0".to_string());
        }
        if p.batch_size == 0 {
            return invalid("batch_size", "0".to_string());
        }
        if !(p.l2 >= 0.0 && p.l2.is_finite()) {
            return invalid("l2", p.l2.to_string());
        }
        if !(0.0..1.0).contains(&p.validation_split) {
            return invalid("validation_split", p.validation_split.to_string());
        }
        Ok(())
    }
}

fn default_split_ratio() -> f64 {
    0.8
}

fn default_seed() -> u64 {
    42
}

/// Configuration for one training invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Target column name
    pub target: String,
    /// Feature column names, in matrix column order
    pub features: Vec<String>,
    /// Share of rows (from the top) used for training
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    #[serde(default)]
    pub model: ModelSpec,
    #[serde(default)]
    pub coercion: CoercionMode,
    /// Seed for bootstrap sampling, weight init and shuffling
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fail with `NumericDegeneracy` instead of clamping when the target is constant
    #[serde(default)]
    pub reject_constant_target: bool,
}

impl TrainingConfig {
    /// Configuration with the family's default hyperparameters and a 0.8 split
    pub fn new<I, S>(target: impl Into<String>, features: I, model_type: ModelType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            features: features.into_iter().map(Into::into).collect(),
            split_ratio: default_split_ratio(),
            model: model_type.default_spec(),
            coercion: CoercionMode::default(),
            seed: default_seed(),
            reject_constant_target: false,
        }
    }

    /// Adopt an advisor recommendation: its ranked features and hyperparameters
    pub fn from_suggestion(target: impl Into<String>, suggestion: &ModelSuggestion) -> Self {
        Self {
            model: suggestion.model.clone(),
            ..Self::new(target, suggestion.ranked_features.iter().cloned(), suggestion.model_type)
        }
    }

    /// Load from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_split_ratio(mut self, split_ratio: f64) -> Self {
        self.split_ratio = split_ratio;
        self
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.model = model;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_coercion(mut self, coercion: CoercionMode) -> Self {
        self.coercion = coercion;
        self
    }

    pub fn with_reject_constant_target(mut self, reject: bool) -> Self {
        self.reject_constant_target = reject;
        self
    }

    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    /// Structural checks that do not need the data
    pub fn validate(&self) -> Result<()> {
        validate_columns(&self.target, &self.features)?;

        if !(self.split_ratio > 0.0 && self.split_ratio <= 1.0) {
            return Err(TabsightError::ValidationError(format!(
                "split ratio must be in (0, 1], got {}",
                self.split_ratio
            )));
        }

        self.model.validate()
    }
}

/// Target must be named, features non-empty, unique and disjoint from the target
pub(crate) fn validate_columns(target: &str, features: &[String]) -> Result<()> {
    if target.trim().is_empty() {
        return Err(TabsightError::ValidationError("target column is required".to_string()));
    }
    if features.is_empty() {
        return Err(TabsightError::ValidationError("at least one feature is required".to_string()));
    }
    if features.iter().any(|f| f == target) {
        return Err(TabsightError::ValidationError(format!(
            "target '{}' cannot also be a feature",
            target
        )));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = features.iter().find(|f| !seen.insert(f.as_str())) {
        return Err(TabsightError::ValidationError(format!("duplicate feature '{}'", dup)));
    }

    Ok(())
}
