//! Z-score scaling

use crate::utils::stats;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Mean and standard deviation of one column.
///
/// A zero (or non-finite) standard deviation is stored as `1.0`, so a constant
/// column normalizes to all zeros instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl NormalizationStats {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        let std_dev = if std_dev == 0.0 || !std_dev.is_finite() { 1.0 } else { std_dev };
        Self { mean, std_dev }
    }

    /// Population mean and standard deviation of `values`
    pub fn fit(values: &[f64]) -> Self {
        Self::new(stats::mean(values), stats::std_dev(values))
    }

    #[inline]
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }

    #[inline]
    pub fn denormalize(&self, value: f64) -> f64 {
        value * self.std_dev + self.mean
    }

    pub fn normalize_all(&self, values: &Array1<f64>) -> Array1<f64> {
        values.mapv(|v| self.normalize(v))
    }

    pub fn denormalize_all(&self, values: &Array1<f64>) -> Array1<f64> {
        values.mapv(|v| self.denormalize(v))
    }
}

impl Default for NormalizationStats {
    fn default() -> Self {
        Self { mean: 0.0, std_dev: 1.0 }
    }
}

/// Column-wise z-score scaler over a feature matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    stats: Vec<NormalizationStats>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit one [`NormalizationStats`] per column
    pub fn fit(&mut self, x: &Array2<f64>) -> &mut Self {
        self.stats = x
            .axis_iter(Axis(1))
            .map(|col| {
                let values: Vec<f64> = col.iter().copied().collect();
                NormalizationStats::fit(&values)
            })
            .collect();
        self
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (mut col, stats) in out.axis_iter_mut(Axis(1)).zip(self.stats.iter()) {
            col.mapv_inplace(|v| stats.normalize(v));
        }
        out
    }

    pub fn inverse_transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (mut col, stats) in out.axis_iter_mut(Axis(1)).zip(self.stats.iter()) {
            col.mapv_inplace(|v| stats.denormalize(v));
        }
        out
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Array2<f64> {
        self.fit(x);
        self.transform(x)
    }

    pub fn stats(&self) -> &[NormalizationStats] {
        &self.stats
    }
}
