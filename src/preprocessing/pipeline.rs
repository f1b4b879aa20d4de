//! Normalization and positional train/test split

use super::scaler::{NormalizationStats, StandardScaler};
use crate::data::{CoercionMode, Dataset};
use crate::error::{Result, TabsightError};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Normalized train partition, raw-unit test targets, and the statistics
/// needed to map predictions back to original units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedData {
    /// Normalized training features
    pub x_train: Array2<f64>,
    /// Normalized training targets
    pub y_train: Array1<f64>,
    /// Normalized test features
    pub x_test: Array2<f64>,
    /// Test targets in original units
    pub y_test: Array1<f64>,
    /// Per-feature statistics, in feature order
    pub feature_stats: Vec<NormalizationStats>,
    /// Target statistics
    pub target_stats: NormalizationStats,
    /// First test row
    pub split_index: usize,
    /// Every target value is identical
    pub constant_target: bool,
}

impl PreparedData {
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }
}

/// Coerces, normalizes and splits a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    split_ratio: f64,
    coercion: CoercionMode,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl Preprocessor {
    pub fn new(split_ratio: f64) -> Self {
        Self {
            split_ratio,
            coercion: CoercionMode::Lenient,
        }
    }

    pub fn with_coercion(mut self, coercion: CoercionMode) -> Self {
        self.coercion = coercion;
        self
    }

    /// `floor(row_count * split_ratio)`
    pub fn split_index(row_count: usize, split_ratio: f64) -> usize {
        ((row_count as f64) * split_ratio).floor() as usize
    }

    /// Normalize features and target over the whole dataset, then split by position.
    ///
    /// Rows `[0, split)` train, rows `[split, n)` test. Statistics cover every row,
    /// not just the training partition.
    pub fn normalize(&self, dataset: &Dataset, target: &str, features: &[String]) -> Result<PreparedData> {
        if !(self.split_ratio > 0.0 && self.split_ratio <= 1.0) {
            return Err(TabsightError::ValidationError(format!(
                "split ratio must be in (0, 1], got {}",
                self.split_ratio
            )));
        }

        let n_rows = dataset.len();
        let split_index = Self::split_index(n_rows, self.split_ratio);
        if split_index == 0 {
            return Err(TabsightError::ValidationError(format!(
                "split ratio {} leaves no training rows out of {}",
                self.split_ratio, n_rows
            )));
        }
        if split_index >= n_rows {
            return Err(TabsightError::ValidationError(format!(
                "split ratio {} leaves no test rows out of {}",
                self.split_ratio, n_rows
            )));
        }

        let x_raw = dataset.numeric_matrix(features, self.coercion)?;
        let y_values = dataset.numeric_column(target, self.coercion)?;

        let mut scaler = StandardScaler::new();
        let x = scaler.fit_transform(&x_raw);

        let target_stats = NormalizationStats::fit(&y_values);
        let constant_target = y_values.windows(2).all(|w| w[0] == w[1]);
        let y_raw = Array1::from_vec(y_values);
        let y = target_stats.normalize_all(&y_raw);

        debug!(
            rows = n_rows,
            features = features.len(),
            split_index,
            target_mean = target_stats.mean,
            target_std = target_stats.std_dev,
            "Preprocessed dataset"
        );

        Ok(PreparedData {
            x_train: x.slice(s![..split_index, ..]).to_owned(),
            y_train: y.slice(s![..split_index]).to_owned(),
            x_test: x.slice(s![split_index.., ..]).to_owned(),
            y_test: y_raw.slice(s![split_index..]).to_owned(),
            feature_stats: scaler.stats().to_vec(),
            target_stats,
            split_index,
            constant_target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{record, CellValue};

    fn linear_rows(n: usize) -> Dataset {
        (1..=n)
            .map(|i| record([("x", i as f64), ("c", 7.0), ("y", 2.0 * i as f64)]))
            .collect()
    }

    #[test]
    fn test_positional_split() {
        let prepared = Preprocessor::new(0.8)
            .normalize(&linear_rows(10), "y", &["x".to_string()])
            .unwrap();

        assert_eq!(prepared.split_index, 8);
        assert_eq!(prepared.n_train(), 8);
        assert_eq!(prepared.n_test(), 2);
        assert_eq!(prepared.y_test.to_vec(), vec![18.0, 20.0]);
    }

    #[test]
    fn test_stats_cover_all_rows() {
        let prepared = Preprocessor::new(0.5)
            .normalize(&linear_rows(4), "y", &["x".to_string()])
            .unwrap();
        assert!((prepared.feature_stats[0].mean - 2.5).abs() < 1e-12);
        assert!((prepared.target_stats.mean - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_normalizes_to_zero() {
        let prepared = Preprocessor::new(0.8)
            .normalize(&linear_rows(10), "y", &["c".to_string()])
            .unwrap();
        assert_eq!(prepared.feature_stats[0].std_dev, 1.0);
        assert!(prepared.x_train.iter().all(|&v| v == 0.0));
        assert!(prepared.x_test.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_non_numeric_cells_become_zero() {
        let ds = Dataset::new(vec![
            record([("x", CellValue::from("oops")), ("y", CellValue::from(1.0))]),
            record([("x", CellValue::from(2.0)), ("y", CellValue::from(2.0))]),
            record([("x", CellValue::from(4.0)), ("y", CellValue::from(3.0))]),
        ]);
        let prepared = Preprocessor::new(0.67).normalize(&ds, "y", &["x".to_string()]).unwrap();
        assert!((prepared.feature_stats[0].mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_partitions_rejected() {
        let ds = linear_rows(3);
        let features = ["x".to_string()];
        assert!(matches!(
            Preprocessor::new(1.0).normalize(&ds, "y", &features),
            Err(TabsightError::ValidationError(_))
        ));
        assert!(matches!(
            Preprocessor::new(0.1).normalize(&ds, "y", &features),
            Err(TabsightError::ValidationError(_))
        ));
        assert!(matches!(
            Preprocessor::new(0.0).normalize(&ds, "y", &features),
            Err(TabsightError::ValidationError(_))
        ));
    }
}
