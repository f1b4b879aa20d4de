//! Regression tree used by the tree ensemble

use crate::error::{Result, TabsightError};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Variance-reduction regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for every split (all when `None`)
    pub max_features: Option<usize>,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Fit on the rows listed in `indices` (bootstrap samples may repeat rows)
    pub fn fit_indices<R: Rng + ?Sized>(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut R,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TabsightError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(TabsightError::TrainingError("tree needs at least one sample".to_string()));
        }

        self.n_features = x.ncols();
        self.root = Some(self.build_tree(x, y, indices, 0, rng));
        Ok(())
    }

    pub fn fit<R: Rng + ?Sized>(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut R) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices, rng)
    }

    fn build_tree<R: Rng + ?Sized>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut R,
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let leaf = || TreeNode::Leaf {
            value: mean(&y_subset),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples <= self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(&y_subset);
        if should_stop {
            return leaf();
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, indices, rng) else {
            return leaf();
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return leaf();
        }

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            gain,
        }
    }

    /// Best (feature, threshold, variance reduction) over a random feature subset
    fn find_best_split<R: Rng + ?Sized>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut R,
    ) -> Option<(usize, f64, f64)> {
        let n_features = x.ncols();
        let n_try = self.max_features.unwrap_or(n_features).min(n_features);
        let candidates: Vec<usize> = if n_try < n_features {
            sample(rng, n_features, n_try).into_vec()
        } else {
            (0..n_features).collect()
        };

        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_impurity = variance_from_sums(indices.len(), total_sum, total_sq);

        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in candidates {
            // Sort once, then sweep thresholds with running sums
            let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_count = 0usize;
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for k in 0..pairs.len() - 1 {
                let (xv, yv) = pairs[k];
                left_count += 1;
                left_sum += yv;
                left_sq += yv * yv;

                let next_x = pairs[k + 1].0;
                if next_x <= xv {
                    continue;
                }

                let right_count = pairs.len() - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let left_impurity = variance_from_sums(left_count, left_sum, left_sq);
                let right_impurity =
                    variance_from_sums(right_count, total_sum - left_sum, total_sq - left_sq);
                let weighted =
                    (left_count as f64 * left_impurity + right_count as f64 * right_impurity) / n;
                let gain = parent_impurity - weighted;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, (xv + next_x) / 2.0, gain));
                }
            }
        }

        best
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TabsightError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(TabsightError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Depth counting the root as level 1
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn mean(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().sum::<f64>() / y.len() as f64
}

fn is_pure(y: &[f64]) -> bool {
    match y.first() {
        None => true,
        Some(&first) => y.iter().all(|&v| (v - first).abs() < 1e-10),
    }
}

/// Var = E[X²] - E[X]², clamped at zero against rounding
fn variance_from_sums(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_regressor_fits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut rng).unwrap();

        let predictions = tree.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y, &mut rng).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut rng).unwrap();

        assert_eq!(tree.get_n_leaves(), 1);
        assert_eq!(tree.predict(&array![[10.0]]).unwrap()[0], 4.0);
    }

    #[test]
    fn test_predict_unfitted() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(TabsightError::ModelNotFitted)));
    }
}
