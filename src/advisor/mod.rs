//! Model advisor
//!
//! Inspects raw feature/target structure and recommends a model family, a ranked
//! feature subset and hyperparameters. Never trains anything.

use crate::data::{CoercionMode, Dataset};
use crate::error::{Result, TabsightError};
use crate::training::{
    validate_columns, LinearParams, ModelSpec, ModelType, NeuralNetParams, TreeEnsembleParams,
};
use crate::utils::stats::pearson;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Most features a suggestion will rank
pub const MAX_RANKED_FEATURES: usize = 5;

const LINEAR_MAX_NON_LINEARITY: f64 = 0.3;
const LINEAR_MIN_CORRELATION: f64 = 0.7;
const NEURAL_MIN_FEATURES: usize = 6;
const NEURAL_MIN_NON_LINEARITY: f64 = 0.7;

/// Correlation of one candidate feature with the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelation {
    pub feature: String,
    /// Pearson r in [-1, 1]
    pub correlation: f64,
}

/// Statistics the decision was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAnalysis {
    /// Mean absolute correlation across candidates
    pub mean_correlation: f64,
    /// Gap between the linear and quadratic signal correlations, in [0, 1]
    pub non_linearity: f64,
    pub feature_count: usize,
    /// Per-candidate correlations, in candidate order
    pub correlations: Vec<FeatureCorrelation>,
}

/// A recommended model family with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSuggestion {
    pub model_type: ModelType,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub rationale: String,
    /// Strongest candidates by |r|, at most five
    pub ranked_features: Vec<String>,
    /// Family tag plus suggested hyperparameters
    pub model: ModelSpec,
    pub analysis: DataAnalysis,
}

impl fmt::Display for ModelSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (confidence {:.0}%): {}",
            self.model_type,
            self.confidence * 100.0,
            self.rationale
        )
    }
}

/// Recommend a model for predicting `target` from `candidate_features`
pub fn suggest(dataset: &Dataset, candidate_features: &[String], target: &str) -> Result<ModelSuggestion> {
    if dataset.is_empty() {
        return Err(TabsightError::ValidationError("dataset has no rows".to_string()));
    }
    validate_columns(target, candidate_features)?;

    let y = dataset.numeric_column(target, CoercionMode::Lenient)?;
    let columns = candidate_features
        .iter()
        .map(|name| dataset.numeric_column(name, CoercionMode::Lenient))
        .collect::<Result<Vec<_>>>()?;

    let analysis = analyze(candidate_features, &columns, &y);
    let (model_type, confidence, rationale) = decide(&analysis);
    let ranked_features = rank_features(&analysis.correlations);
    let model = suggested_spec(model_type, analysis.feature_count, analysis.non_linearity);

    debug!(
        model = %model_type,
        mean_correlation = analysis.mean_correlation,
        non_linearity = analysis.non_linearity,
        features = analysis.feature_count,
        "Model suggestion"
    );

    Ok(ModelSuggestion {
        model_type,
        confidence,
        rationale,
        ranked_features,
        model,
        analysis,
    })
}

fn analyze(names: &[String], columns: &[Vec<f64>], y: &[f64]) -> DataAnalysis {
    let correlations: Vec<FeatureCorrelation> = names
        .iter()
        .zip(columns)
        .map(|(name, column)| FeatureCorrelation {
            feature: name.clone(),
            correlation: pearson(column, y),
        })
        .collect();

    let mean_correlation =
        correlations.iter().map(|c| c.correlation.abs()).sum::<f64>() / correlations.len().max(1) as f64;

    // Row sums (X . 1) against row sums of squares (diag of X X^T)
    let mut linear_signal = vec![0.0; y.len()];
    let mut quadratic_signal = vec![0.0; y.len()];
    for column in columns {
        for (row, &v) in column.iter().enumerate() {
            linear_signal[row] += v;
            quadratic_signal[row] += v * v;
        }
    }
    let non_linearity = (pearson(&linear_signal, y).abs() - pearson(&quadratic_signal, y).abs()).abs();

    DataAnalysis {
        mean_correlation,
        non_linearity,
        feature_count: names.len(),
        correlations,
    }
}

fn decide(analysis: &DataAnalysis) -> (ModelType, f64, String) {
    let DataAnalysis {
        mean_correlation: corr,
        non_linearity: nl,
        feature_count: p,
        ..
    } = *analysis;

    if nl < LINEAR_MAX_NON_LINEARITY && corr > LINEAR_MIN_CORRELATION {
        (
            ModelType::Linear,
            0.8,
            format!(
                "Features correlate strongly with the target (mean |r| = {:.2}) with little curvature (non-linearity {:.2})",
                corr, nl
            ),
        )
    } else if p >= NEURAL_MIN_FEATURES || nl > NEURAL_MIN_NON_LINEARITY {
        let reason = if p >= NEURAL_MIN_FEATURES {
            format!("{} candidate features", p)
        } else {
            format!("strong non-linearity ({:.2})", nl)
        };
        (
            ModelType::NeuralNet,
            0.75,
            format!(
                "{} suit a neural network (mean |r| = {:.2}, non-linearity {:.2})",
                capitalize(&reason),
                corr,
                nl
            ),
        )
    } else {
        (
            ModelType::TreeEnsemble,
            0.85,
            format!(
                "Moderate structure (mean |r| = {:.2}, non-linearity {:.2}) across {} features suits a tree ensemble",
                corr, nl, p
            ),
        )
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Candidates by |r| descending, ties kept in candidate order
fn rank_features(correlations: &[FeatureCorrelation]) -> Vec<String> {
    let mut ranked: Vec<&FeatureCorrelation> = correlations.iter().collect();
    ranked.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
    ranked
        .into_iter()
        .take(MAX_RANKED_FEATURES)
        .map(|c| c.feature.clone())
        .collect()
}

/// Hyperparameters scaled by feature count and non-linearity
pub fn suggested_spec(model_type: ModelType, feature_count: usize, non_linearity: f64) -> ModelSpec {
    let p = feature_count;
    let nl = non_linearity;

    match model_type {
        ModelType::Linear => ModelSpec::Linear(LinearParams::default()),
        ModelType::TreeEnsemble => ModelSpec::TreeEnsemble(TreeEnsembleParams {
            num_trees: (50 + 10 * p).clamp(10, 200),
            tree_depth: (4 + p).clamp(3, 20),
            ..Default::default()
        }),
        ModelType::NeuralNet => ModelSpec::NeuralNet(NeuralNetParams {
            epochs: (50 + (50.0 * nl).round() as usize).clamp(10, 100),
            learning_rate: (0.001 / (1.0 + nl)).clamp(1e-4, 1e-2),
            hidden_layers: vec![(8 * p).clamp(16, 128), (4 * p).clamp(8, 64)],
            dropout: (0.1 + 0.2 * nl).clamp(0.0, 0.5),
            batch_size: 32,
            ..Default::default()
        }),
    }
}
