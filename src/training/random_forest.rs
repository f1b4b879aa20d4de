//! Bagged regression trees

use super::config::{ModelType, TreeEnsembleParams};
use super::decision_tree::DecisionTree;
use super::models::Regressor;
use crate::error::{Result, TabsightError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Bootstrap sampling with replacement
    pub bootstrap: bool,
    /// Base seed; tree `i` uses `seed + i`
    pub random_state: u64,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::from_params(&TreeEnsembleParams::default(), 42)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: TreeEnsembleParams::default().tree_depth,
            min_samples_split: 2,
            bootstrap: true,
            random_state: 42,
            n_features: 0,
        }
    }

    /// Build from hyperparameters, applying their caps
    pub fn from_params(params: &TreeEnsembleParams, seed: u64) -> Self {
        Self::new(params.effective_num_trees())
            .with_max_depth(params.effective_tree_depth())
            .with_min_samples_split(params.min_samples_split)
            .with_random_state(seed)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// `floor(sqrt(n_features))`, at least one
    pub fn max_features_per_split(n_features: usize) -> usize {
        ((n_features as f64).sqrt().floor() as usize).max(1)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(TabsightError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TabsightError::TrainingError("no training rows".to_string()));
        }

        self.n_features = n_features;
        let max_features = Self::max_features_per_split(n_features);
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_max_features(max_features);
                tree.fit_indices(x, y, &sample_indices, &mut rng)?;
                Ok(tree)
            })
            .collect::<Result<_>>()?;

        debug!(
            trees = trees.len(),
            max_depth = self.max_depth,
            max_features,
            "Fitted tree ensemble"
        );

        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(TabsightError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut sum: Array1<f64> = Array1::zeros(x.nrows());
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / all_predictions.len() as f64)
    }

    fn model_type(&self) -> ModelType {
        ModelType::TreeEnsemble
    }
}
