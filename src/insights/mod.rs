//! Plain-text performance reports for finished training runs

use crate::training::{MetricSet, ModelType};
use crate::utils::stats::variance;

const STRONG_R2: f64 = 0.8;
const MODERATE_R2: f64 = 0.6;
const SUGGESTION_R2: f64 = 0.7;

/// Qualitative fit band for an r2 value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitQuality {
    Strong,
    Moderate,
    Weak,
}

impl FitQuality {
    pub fn from_r2(r2: f64) -> Self {
        if r2 > STRONG_R2 {
            FitQuality::Strong
        } else if r2 > MODERATE_R2 {
            FitQuality::Moderate
        } else {
            FitQuality::Weak
        }
    }
}

/// Build a short report: fit headline, error summary, error spread warning and,
/// for weak fits, a model-specific next step.
pub fn report(model_type: ModelType, metrics: &MetricSet, predictions: &[f64], actuals: &[f64]) -> String {
    let mut lines = Vec::with_capacity(4);

    let r2_pct = metrics.r2 * 100.0;
    lines.push(match FitQuality::from_r2(metrics.r2) {
        FitQuality::Strong => format!(
            "Strong fit: the {} model explains {:.1}% of the variance in the target.",
            model_type, r2_pct
        ),
        FitQuality::Moderate => format!(
            "Moderate fit: the {} model explains {:.1}% of the variance in the target.",
            model_type, r2_pct
        ),
        FitQuality::Weak => format!(
            "Weak fit: the {} model explains only {:.1}% of the variance in the target.",
            model_type, r2_pct
        ),
    });

    lines.push(format!(
        "Predictions are off by {:.4} on average (MAE), with an RMSE of {:.4}.",
        metrics.mae, metrics.rmse
    ));

    if has_high_error_variance(predictions, actuals, metrics.mae) {
        lines.push(
            "Error size varies widely between rows; some inputs are predicted much worse than others."
                .to_string(),
        );
    }

    if metrics.r2 < SUGGESTION_R2 {
        lines.push(
            match model_type {
                ModelType::Linear => {
                    "Try a tree ensemble or neural net; the relationship may not be linear."
                }
                ModelType::NeuralNet => {
                    "Try tuning the network: more epochs, a different learning rate or wider hidden layers."
                }
                ModelType::TreeEnsemble => {
                    "Try engineering more informative features or collecting more training rows."
                }
            }
            .to_string(),
        );
    }

    lines.join("\n")
}

/// `variance(|p - a|) > 2 * mae`
fn has_high_error_variance(predictions: &[f64], actuals: &[f64], mae: f64) -> bool {
    let errors: Vec<f64> = predictions
        .iter()
        .zip(actuals)
        .map(|(p, a)| (p - a).abs())
        .collect();

    !errors.is_empty() && variance(&errors) > 2.0 * mae
}
