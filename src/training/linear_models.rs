//! Linear model implementations

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{ParamGrid, ParamValue};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Regularization penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Penalty {
    L1,
    L2,
    None,
}

impl Penalty {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "l1" => Ok(Penalty::L1),
            "l2" => Ok(Penalty::L2),
            "none" => Ok(Penalty::None),
            other => Err(RacoonsError::invalid_parameter("penalty", other, "expected l1, l2 or none")),
        }
    }
}

/// Optimisation routine used by [`LogisticRegression::fit`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Solver {
    /// Full-batch gradient descent; the L1 term contributes a sub-gradient
    GradientDescent,
    /// Gradient step on the loss followed by the penalty's proximal map (ISTA)
    ProximalGradient,
}

impl Solver {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "gradient_descent" => Ok(Solver::GradientDescent),
            "proximal_gradient" => Ok(Solver::ProximalGradient),
            other => Err(RacoonsError::invalid_parameter(
                "solver",
                other,
                "expected gradient_descent or proximal_gradient",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Solver::GradientDescent => "gradient_descent",
            Solver::ProximalGradient => "proximal_gradient",
        }
    }
}

/// Soft-thresholding operator, the proximal map of `t * |w|`
pub(crate) fn soft_threshold(w: f64, t: f64) -> f64 {
    if w > t {
        w - t
    } else if w < -t {
        w + t
    } else {
        0.0
    }
}

/// Binary logistic regression.
///
/// Minimises `mean(log_loss) + penalty(w) / (C * n_samples)`, which has the
/// same minimiser as the `C * sum(log_loss) + penalty(w)` form. The
/// intercept is never penalised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub fit_intercept: bool,
    pub penalty: Penalty,
    /// Inverse regularization strength
    pub c: f64,
    pub solver: Solver,
    pub max_iter: usize,
    pub tol: f64,
    /// Step size; derived from the data's Lipschitz bound when `None`
    pub learning_rate: Option<f64>,
    pub is_fitted: bool,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            penalty: Penalty::L2,
            c: 1.0,
            solver: Solver::GradientDescent,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: None,
            is_fitted: false,
            n_iter: 0,
        }
    }

    /// L1-penalised model solved with ISTA, as used for lasso selection
    pub fn lasso(c: f64) -> Self {
        Self::new()
            .with_penalty(Penalty::L1)
            .with_solver(Solver::ProximalGradient)
            .with_c(c)
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = Some(lr);
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Number of iterations the last fit ran for
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RacoonsError::ValidationError("Cannot fit on zero samples".to_string()));
        }
        if !(self.c > 0.0) {
            return Err(RacoonsError::invalid_parameter("C", self.c, "must be positive"));
        }

        let alpha = 1.0 / (self.c * n_samples as f64);
        let lr = match self.learning_rate {
            Some(lr) => lr,
            None => {
                // 1 / L for the mean log loss: L <= 0.25 * mean squared row norm (+1 for the bias)
                let mean_sq = x.map_axis(Axis(1), |row| row.dot(&row)).mean().unwrap_or(0.0);
                let l2_term = if self.penalty == Penalty::L2 { alpha } else { 0.0 };
                1.0 / (0.25 * (mean_sq + 1.0) + l2_term)
            }
        };

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;
        self.n_iter = self.max_iter;

        for iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let errors = Self::sigmoid(&linear) - y;
            let grad_w = x.t().dot(&errors) / n_samples as f64;
            let grad_b = if self.fit_intercept { errors.mean().unwrap_or(0.0) } else { 0.0 };

            let step = weights.clone() - lr * &grad_w;
            let new_weights = match (self.solver, self.penalty) {
                (_, Penalty::None) => step,
                (Solver::GradientDescent, Penalty::L2) => step - (lr * alpha) * &weights,
                (Solver::GradientDescent, Penalty::L1) => {
                    // signum(0.0) is 1.0, zero weights take a zero sub-gradient
                    let sign = weights.mapv(|w| if w == 0.0 { 0.0 } else { w.signum() });
                    step - (lr * alpha) * &sign
                }
                (Solver::ProximalGradient, Penalty::L2) => step / (1.0 + lr * alpha),
                (Solver::ProximalGradient, Penalty::L1) => step.mapv(|w| soft_threshold(w, lr * alpha)),
            };
            let new_bias = bias - lr * grad_b;

            let delta = (&new_weights - &weights)
                .iter()
                .fold((new_bias - bias).abs(), |m, d| m.max(d.abs()));
            weights = new_weights;
            bias = new_bias;

            if !delta.is_finite() {
                return Err(RacoonsError::ComputationError(
                    "logistic regression diverged".to_string(),
                ));
            }
            if delta < self.tol {
                self.n_iter = iter + 1;
                break;
            }
        }

        debug!(n_iter = self.n_iter, penalty = ?self.penalty, solver = self.solver.as_str(), "Logistic regression fitted");

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;

        Ok(self)
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(coefficients), true) = (self.coefficients.as_ref(), self.is_fitted) else {
            return Err(RacoonsError::ModelNotFitted("logistic regression".to_string()));
        };
        if x.ncols() != coefficients.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let linear = x.dot(coefficients) + self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&linear))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Absolute coefficients
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients.as_ref().map(|c| c.mapv(f64::abs))
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .with("penalty", vec!["l1".into(), "l2".into()])
            .with("solver", vec!["gradient_descent".into(), "proximal_gradient".into()])
            .with("C", vec![ParamValue::Float(0.1), ParamValue::Float(1.0), ParamValue::Float(10.0)])
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "penalty" => self.penalty = Penalty::parse(value.as_str(name)?)?,
            "solver" => self.solver = Solver::parse(value.as_str(name)?)?,
            "C" => {
                let c = value.as_f64(name)?;
                if c <= 0.0 {
                    return Err(RacoonsError::invalid_parameter(name, c, "must be positive"));
                }
                self.c = c;
            }
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "tol" => self.tol = value.as_f64(name)?,
            "fit_intercept" => self.fit_intercept = value.as_str(name)? == "true",
            _ => {
                return Err(RacoonsError::invalid_parameter(
                    name,
                    value,
                    "unknown logistic_regression parameter",
                ))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0, 0.3],
            [-1.5, -0.2],
            [-1.0, 0.1],
            [-0.5, -0.4],
            [0.5, 0.2],
            [1.0, -0.1],
            [1.5, 0.4],
            [2.0, -0.3]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_regression() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        let coefs = model.coefficients.as_ref().unwrap();
        assert!(coefs[0] > 0.0);
    }

    #[test]
    fn test_lasso_zeroes_noise_feature() {
        let (x, y) = separable();
        let mut model = LogisticRegression::lasso(0.5);
        model.fit(&x, &y).unwrap();
        let coefs = model.coefficients.as_ref().unwrap();
        assert!(coefs[0] > 0.0);
        assert_eq!(coefs[1], 0.0);
    }

    #[test]
    fn test_solvers_agree_on_l2() {
        let (x, y) = separable();
        let mut gd = LogisticRegression::new().with_solver(Solver::GradientDescent).with_c(0.5);
        let mut prox = LogisticRegression::new().with_solver(Solver::ProximalGradient).with_c(0.5);
        gd.fit(&x, &y).unwrap();
        prox.fit(&x, &y).unwrap();
        let a = gd.coefficients.unwrap();
        let b = prox.coefficients.unwrap();
        assert!((a[0] - b[0]).abs() < 1e-2, "{} vs {}", a[0], b[0]);
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(0.3, 0.5), 0.0);
        assert_eq!(soft_threshold(1.5, 0.5), 1.0);
        assert_eq!(soft_threshold(-1.5, 0.5), -1.0);
    }

    #[test]
    fn test_invalid_params() {
        let mut model = LogisticRegression::new();
        assert!(model.set_param("C", &ParamValue::Float(0.0)).is_err());
        assert!(model.set_param("penalty", &ParamValue::str("elasticnet")).is_err());
        assert!(model.predict_proba(&array![[1.0, 2.0]]).is_err());
    }
}
