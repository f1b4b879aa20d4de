//! Linear least-squares backend
//!
//! Multivariate ordinary least squares over every configured feature, solved via
//! the normal equations. With a single feature this reduces to the classic
//! slope/intercept fit.

use super::config::{LinearParams, ModelType};
use super::models::Regressor;
use crate::error::{Result, TabsightError};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Pivots smaller than this make the elimination fallback give up
const MIN_PIVOT: f64 = 1e-10;

/// Solve `(XᵀX) w = Xᵀy`.
///
/// Tries a Cholesky factorization, then the same with a small ridge on the
/// diagonal for collinear or constant columns, then Gaussian elimination.
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    let gram = x.t().dot(x);
    let moment = x.t().dot(y);

    if gram.iter().chain(moment.iter()).any(|v| !v.is_finite()) {
        return Err(TabsightError::TrainingError(
            "normal equations overflowed; feature or target magnitudes are too large".to_string(),
        ));
    }

    let ridge = (1e-8 * gram.diag().mapv(f64::abs).mean().unwrap_or(0.0)).max(MIN_PIVOT);

    cholesky_solve(&gram, &moment, 0.0)
        .or_else(|| cholesky_solve(&gram, &moment, ridge))
        .or_else(|| gaussian_elimination(gram.clone(), moment.clone()))
        .ok_or_else(|| TabsightError::TrainingError("normal equations are singular".to_string()))
}

/// Factor `a + ridge·I = L Lᵀ` and solve by forward then back substitution.
/// `None` when the shifted matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>, ridge: f64) -> Option<Array1<f64>> {
    let n = b.len();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let partial = l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));
            if i == j {
                let diag = a[[i, i]] + ridge - partial;
                if diag.is_nan() || diag <= 0.0 {
                    return None;
                }
                l[[i, i]] = diag.sqrt();
            } else {
                let value = (a[[i, j]] - partial) / l[[j, j]];
                l[[i, j]] = value;
            }
        }
    }

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let value = (b[i] - l.slice(s![i, ..i]).dot(&z.slice(s![..i]))) / l[[i, i]];
        z[i] = value;
    }

    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let value = (z[i] - l.slice(s![i + 1.., i]).dot(&w.slice(s![i + 1..]))) / l[[i, i]];
        w[i] = value;
    }

    Some(w)
}

/// Row-reduce `[a | b]` with partial pivoting, then back-substitute
fn gaussian_elimination(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < MIN_PIVOT {
            return None;
        }
        if pivot != col {
            for k in col..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let value = (b[i] - a.slice(s![i, i + 1..]).dot(&w.slice(s![i + 1..]))) / a[[i, i]];
        w[i] = value;
    }

    Some(w)
}

/// Linear regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients, one per feature
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
        }
    }

    pub fn from_params(params: &LinearParams) -> Self {
        Self::new().with_fit_intercept(params.fit_intercept)
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(TabsightError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TabsightError::TrainingError("no training rows".to_string()));
        }

        let (coefficients, intercept) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| TabsightError::TrainingError("empty feature matrix".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);

            let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            let coef = solve_normal_equations(&x_centered, &y_centered)?;
            let intercept = y_mean - coef.dot(&x_mean);
            (coef, intercept)
        } else {
            let coef = solve_normal_equations(x, y)?;
            (coef, 0.0)
        };

        if coefficients.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
            return Err(TabsightError::TrainingError(
                "least squares produced non-finite coefficients".to_string(),
            ));
        }

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(TabsightError::ModelNotFitted)?;

        if x.ncols() != coefficients.len() {
            return Err(TabsightError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    fn model_type(&self) -> ModelType {
        ModelType::Linear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_feature_exact_fit() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((model.intercept.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_multivariate_fit() {
        // y = 2*x1 + 3*x2 + 1
        let x = array![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [2.0, 2.0], [3.0, 1.0]];
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-6, "prediction {} vs {}", p, t);
        }
    }

    #[test]
    fn test_collinear_and_constant_columns() {
        let x = array![[1.0, 2.0, 0.0], [2.0, 4.0, 0.0], [3.0, 6.0, 0.0], [4.0, 8.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(TabsightError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_solver_fallbacks_agree() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];

        let chol = cholesky_solve(&a, &b, 0.0).unwrap();
        let gauss = gaussian_elimination(a.clone(), b.clone()).unwrap();
        for (c, g) in chol.iter().zip(gauss.iter()) {
            assert!((c - g).abs() < 1e-12);
        }
        let residual = a.dot(&chol) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-12));

        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(cholesky_solve(&singular, &b, 0.0).is_none());
        assert!(gaussian_elimination(singular, b).is_none());
    }

    #[test]
    fn test_overflowing_features_are_training_error() {
        let x = array![[1e200, 2e200], [2e200, 1e200], [3e200, 3e200], [4e200, 5e200]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        for fit_intercept in [true, false] {
            let mut model = LinearRegression::new().with_fit_intercept(fit_intercept);
            let err = model.fit(&x, &y).unwrap_err();
            assert!(matches!(err, TabsightError::TrainingError(_)), "got {:?}", err);
            assert!(!model.is_fitted());
        }
    }

    #[test]
    fn test_nan_features_are_training_error() {
        let x = array![[1.0], [f64::NAN], [3.0]];
        let y = array![1.0, 2.0, 3.0];

        let mut model = LinearRegression::new();
        assert!(matches!(model.fit(&x, &y), Err(TabsightError::TrainingError(_))));
    }
}
