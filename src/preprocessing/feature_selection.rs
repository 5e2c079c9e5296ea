//! L1-based feature selection (Lasso)
//!
//! Select-from-model over an L1-penalised logistic regression: a feature is
//! kept when the magnitude of its fitted coefficient exceeds `threshold`.

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{split_param_key, ParamGrid, ParamValue};
use crate::training::linear_models::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Coefficients at or below this magnitude count as zero
pub const DEFAULT_THRESHOLD: f64 = 1e-5;

/// The `feature_selection` pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoSelector {
    pub estimator: LogisticRegression,
    pub threshold: f64,
    support: Option<Vec<usize>>,
    scores: Option<Array1<f64>>,
}

impl Default for LassoSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl LassoSelector {
    pub fn new() -> Self {
        Self {
            estimator: LogisticRegression::lasso(1.0),
            threshold: DEFAULT_THRESHOLD,
            support: None,
            scores: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Indices of the selected input columns, ascending
    pub fn support(&self) -> Option<&[usize]> {
        self.support.as_deref()
    }

    /// Absolute coefficients of the underlying model
    pub fn scores(&self) -> Option<&Array1<f64>> {
        self.scores.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.ncols() == 0 {
            return Err(RacoonsError::DataError(
                "Feature selection needs at least one column".to_string(),
            ));
        }
        self.estimator.fit(x, y)?;
        let scores = self
            .estimator
            .feature_importances()
            .ok_or_else(|| RacoonsError::ModelNotFitted("lasso estimator".to_string()))?;

        let mut support: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| **s > self.threshold)
            .map(|(i, _)| i)
            .collect();

        if support.is_empty() {
            // keep the strongest feature so the estimator has an input
            let best = scores
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc })
                .0;
            warn!(
                c = self.estimator.c,
                kept = best,
                "Lasso removed every feature, keeping the largest coefficient"
            );
            support.push(best);
        }

        debug!(n_in = x.ncols(), n_selected = support.len(), "Fitted lasso selector");
        self.support = Some(support);
        self.scores = Some(scores);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let support = self
            .support
            .as_ref()
            .ok_or_else(|| RacoonsError::ModelNotFitted("feature selection".to_string()))?;
        if let Some(&max) = support.last() {
            if max >= x.ncols() {
                return Err(RacoonsError::ShapeError {
                    expected: format!("at least {} columns", max + 1),
                    actual: format!("{} columns", x.ncols()),
                });
            }
        }
        Ok(x.select(Axis(1), support))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>> {
        self.fit(x, y)?;
        self.transform(x)
    }

    /// Names of the selected columns
    pub fn selected_names(&self, names: &[String]) -> Result<Vec<String>> {
        let support = self
            .support
            .as_ref()
            .ok_or_else(|| RacoonsError::ModelNotFitted("feature selection".to_string()))?;
        support
            .iter()
            .map(|&i| {
                names.get(i).cloned().ok_or_else(|| RacoonsError::ShapeError {
                    expected: format!("at least {} names", i + 1),
                    actual: format!("{} names", names.len()),
                })
            })
            .collect()
    }

    /// Grid over the wrapped model, keys relative to this stage
    pub fn param_grid() -> ParamGrid {
        let mut grid = ParamGrid::new();
        grid.extend_prefixed(
            "estimator",
            ParamGrid::new()
                .with("C", vec![ParamValue::Float(0.1), ParamValue::Float(1.0)])
                .with(
                    "solver",
                    vec!["gradient_descent".into(), "proximal_gradient".into()],
                ),
        );
        grid
    }

    /// `estimator__*` keys go to the wrapped model
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match split_param_key(name) {
            Some(("estimator", rest)) => self.estimator.set_param(rest, value),
            None if name == "threshold" => {
                self.threshold = value.as_f64(name)?;
                Ok(())
            }
            _ => Err(RacoonsError::invalid_parameter(
                name,
                value,
                "unknown feature_selection parameter",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn informative_plus_noise() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64 / n as f64 * 4.0 - 2.0,
            1 => if i % 2 == 0 { 0.01 } else { -0.01 },
            _ => ((i * 7) % 5) as f64 * 0.001,
        });
        let y = Array1::from_iter((0..n).map(|i| if i >= n / 2 { 1.0 } else { 0.0 }));
        (x, y)
    }

    #[test]
    fn test_selects_informative_feature() {
        let (x, y) = informative_plus_noise();
        let mut selector = LassoSelector::new();
        let out = selector.fit_transform(&x, &y).unwrap();

        let support = selector.support().unwrap();
        assert!(support.contains(&0));
        assert_eq!(out.ncols(), support.len());

        let names: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(selector.selected_names(&names).unwrap()[0], "a");
    }

    #[test]
    fn test_never_selects_nothing() {
        let (x, y) = informative_plus_noise();
        let mut selector = LassoSelector::new().with_threshold(f64::MAX);
        selector.fit(&x, &y).unwrap();
        assert_eq!(selector.support().unwrap(), &[0]);
    }

    #[test]
    fn test_param_routing() {
        let grid = LassoSelector::param_grid();
        assert!(grid.contains_key("estimator__C"));
        assert!(grid.contains_key("estimator__solver"));

        let mut selector = LassoSelector::new();
        selector.set_param("estimator__C", &ParamValue::Float(0.1)).unwrap();
        selector
            .set_param("estimator__solver", &"gradient_descent".into())
            .unwrap();
        assert_eq!(selector.estimator.c, 0.1);
        assert!(selector.set_param("alpha", &ParamValue::Float(1.0)).is_err());
    }

    #[test]
    fn test_transform_before_fit() {
        let (x, _) = informative_plus_noise();
        assert!(LassoSelector::new().transform(&x).is_err());
    }
}
