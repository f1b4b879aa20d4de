//! Regression metrics

use crate::error::{Result, TabsightError};
use serde::{Deserialize, Serialize};

/// Held-out regression metrics, in original target units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Mean squared error
    pub mse: f64,
    /// Root mean squared error, always `sqrt(mse)`
    pub rmse: f64,
    /// Coefficient of determination, clamped to [0, 1]
    pub r2: f64,
    /// Mean absolute error
    pub mae: f64,
}

impl MetricSet {
    /// Compute metrics for paired actual/predicted values
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(TabsightError::ShapeError {
                expected: format!("{} predictions", actual.len()),
                actual: format!("{} predictions", predicted.len()),
            });
        }
        if actual.is_empty() {
            return Err(TabsightError::ValidationError(
                "cannot compute metrics over zero rows".to_string(),
            ));
        }

        let n = actual.len() as f64;
        let (ss_res, abs_sum) = actual
            .iter()
            .zip(predicted)
            .fold((0.0, 0.0), |(sq, abs), (a, p)| {
                let e = a - p;
                (sq + e * e, abs + e.abs())
            });

        let mse = ss_res / n;
        let mae = abs_sum / n;

        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            r2: if r2.is_finite() { r2.clamp(0.0, 1.0) } else { 0.0 },
            mae,
        })
    }

    /// Accuracy-style percentage for display and ranking:
    /// `(1 - mse / range^2) * 100`, clamped to [0, 100].
    pub fn accuracy_percentage(actual: &[f64], mse: f64) -> f64 {
        let (min, max) = actual
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &a| (lo.min(a), hi.max(a)));
        let range = max - min;

        if !(range > 0.0) {
            return if mse == 0.0 { 100.0 } else { 0.0 };
        }

        ((1.0 - mse / (range * range)) * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let metrics = MetricSet::compute(&values, &values).unwrap();
        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn test_known_values() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 2.0];
        let metrics = MetricSet::compute(&actual, &predicted).unwrap();

        assert!((metrics.mse - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.mae - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.rmse, metrics.mse.sqrt());
        // mean predictor
        assert_eq!(metrics.r2, 0.0);
    }

    #[test]
    fn test_r2_clamped_below() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [10.0, -5.0, 30.0];
        let metrics = MetricSet::compute(&actual, &predicted).unwrap();
        assert_eq!(metrics.r2, 0.0);
    }

    #[test]
    fn test_constant_actuals() {
        let metrics = MetricSet::compute(&[5.0, 5.0], &[5.0, 5.0]).unwrap();
        assert_eq!(metrics.r2, 0.0);
        assert_eq!(MetricSet::accuracy_percentage(&[5.0, 5.0], metrics.mse), 100.0);
        assert_eq!(MetricSet::accuracy_percentage(&[5.0, 5.0], 0.5), 0.0);
    }

    #[test]
    fn test_mismatched_and_empty() {
        assert!(matches!(
            MetricSet::compute(&[1.0, 2.0], &[1.0]),
            Err(TabsightError::ShapeError { .. })
        ));
        assert!(matches!(
            MetricSet::compute(&[], &[]),
            Err(TabsightError::ValidationError(_))
        ));
    }

    #[test]
    fn test_accuracy_percentage() {
        let actual = [0.0, 10.0];
        assert_eq!(MetricSet::accuracy_percentage(&actual, 0.0), 100.0);
        assert!((MetricSet::accuracy_percentage(&actual, 25.0) - 75.0).abs() < 1e-12);
        assert_eq!(MetricSet::accuracy_percentage(&actual, 500.0), 0.0);
    }
}
