//! AdaBoost (Adaptive Boosting) implementation
//!
//! Discrete SAMME over decision stumps for binary targets. Labels are 0/1 on
//! the outside and mapped to -1/+1 while boosting.

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{ParamGrid, ParamValue};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Vote (-1 or +1) when feature <= threshold
    left_vote: f64,
    /// Vote when feature > threshold
    right_vote: f64,
}

impl Stump {
    fn vote(&self, sample: &ArrayView1<f64>) -> f64 {
        if sample[self.feature_index] <= self.threshold {
            self.left_vote
        } else {
            self.right_vote
        }
    }
}

/// AdaBoost classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    n_features: usize,
    pub is_fitted: bool,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Best stump under the current sample weights, with its weighted error
    fn fit_stump(x: &Array2<f64>, signs: &[f64], weights: &Array1<f64>) -> (Stump, f64) {
        let total_pos: f64 = signs.iter().zip(weights.iter()).filter(|(s, _)| **s > 0.0).map(|(_, w)| w).sum();
        let total_neg: f64 = weights.sum() - total_pos;

        // constant stump voting for the heavier class
        let majority = if total_pos >= total_neg { 1.0 } else { -1.0 };
        let mut best = (
            Stump { feature_index: 0, threshold: f64::INFINITY, left_vote: majority, right_vote: majority },
            total_pos.min(total_neg),
        );

        for f in 0..x.ncols() {
            let col = x.column(f);
            let mut order: Vec<usize> = (0..x.nrows()).collect();
            order.sort_by(|&a, &b| col[a].partial_cmp(&col[b]).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_pos = 0.0;
            let mut left_neg = 0.0;
            for k in 0..order.len().saturating_sub(1) {
                let i = order[k];
                if signs[i] > 0.0 {
                    left_pos += weights[i];
                } else {
                    left_neg += weights[i];
                }
                let (v, next) = (col[i], col[order[k + 1]]);
                if next <= v {
                    continue;
                }

                // left votes -1, right votes +1, or the mirror
                let err_up = left_pos + (total_neg - left_neg);
                let err_down = left_neg + (total_pos - left_pos);
                let threshold = (v + next) / 2.0;
                if err_up < best.1 {
                    best = (Stump { feature_index: f, threshold, left_vote: -1.0, right_vote: 1.0 }, err_up);
                }
                if err_down < best.1 {
                    best = (Stump { feature_index: f, threshold, left_vote: 1.0, right_vote: -1.0 }, err_down);
                }
            }
        }
        best
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RacoonsError::ValidationError("AdaBoost needs at least one sample".to_string()));
        }

        let signs: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.n_features = x.ncols();
        self.stumps.clear();
        self.alphas.clear();

        for round in 0..self.n_estimators {
            let (stump, error) = Self::fit_stump(x, &signs, &weights);
            let error = error / weights.sum();

            if error <= 1e-12 {
                // perfect stump, nothing left to reweight
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                debug!(round, error, "AdaBoost stopped: stump no better than chance");
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();

            for i in 0..n_samples {
                if stump.vote(&x.row(i)) != signs[i] {
                    weights[i] *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Normalised weighted vote in [-1, 1]
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(RacoonsError::ModelNotFitted("ada boost".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(RacoonsError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let alpha_sum: f64 = self.alphas.iter().sum::<f64>().max(1e-12);
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            self.stumps
                .iter()
                .zip(&self.alphas)
                .map(|(stump, alpha)| alpha * stump.vote(&row))
                .sum::<f64>()
                / alpha_sum
        })))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| 1.0 / (1.0 + (-2.0 * d).exp())))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| if d > 0.0 { 1.0 } else { 0.0 }))
    }

    /// Alpha-weighted share of the stumps splitting on each feature
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if !self.is_fitted {
            return None;
        }
        let mut importances = Array1::<f64>::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            if stump.threshold.is_finite() {
                importances[stump.feature_index] += alpha;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        Some(importances)
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .with("learning_rate", vec![ParamValue::Float(0.1), ParamValue::Float(1.0)])
            .with("n_estimators", vec![ParamValue::Int(25), ParamValue::Int(50)])
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "learning_rate" => {
                let lr = value.as_f64(name)?;
                if lr <= 0.0 {
                    return Err(RacoonsError::invalid_parameter(name, lr, "must be positive"));
                }
                self.learning_rate = lr;
            }
            _ => {
                return Err(RacoonsError::invalid_parameter(name, value, "unknown ada_boost parameter"))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_adaboost_separable() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [6.0, 1.0], [7.0, 0.0], [8.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = AdaBoostClassifier::new(10, 1.0);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[0] < 0.5 && proba[5] > 0.5);
        let importances = model.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_adaboost_noisy_uses_several_rounds() {
        let x = array![[1.0, 5.0], [2.0, 1.0], [3.0, 4.0], [4.0, 2.0], [5.0, 3.0], [6.0, 6.0], [7.0, 0.0], [8.0, 7.0]];
        let y = array![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let mut model = AdaBoostClassifier::new(20, 0.5);
        model.fit(&x, &y).unwrap();
        assert!(model.n_stumps() > 1);
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_not_fitted() {
        let model = AdaBoostClassifier::default();
        assert!(matches!(model.predict(&array![[1.0]]), Err(RacoonsError::ModelNotFitted(_))));
    }
}
