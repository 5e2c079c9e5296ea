//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient and hessian of the logistic loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Feature importance is the total split gain per feature

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{ParamGrid, ParamValue};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

impl TreeBuilder<'_> {
    /// Exact greedy tree; split gains are accumulated into `gains`
    fn build(&self, indices: &[usize], depth: usize, gains: &mut [f64]) -> XGBNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let leaf_weight = compute_leaf_weight(g_sum, h_sum, self.config.reg_lambda, self.config.reg_alpha);

        if depth >= self.config.max_depth || indices.len() < 2 || h_sum < self.config.min_child_weight {
            return XGBNode::Leaf { weight: leaf_weight };
        }

        let best_split = self
            .features
            .par_iter()
            .filter_map(|&f| self.best_split_for_feature(indices, f, g_sum, h_sum))
            .reduce_with(|a, b| if b.2 > a.2 || (b.2 == a.2 && b.0 < a.0) { b } else { a });

        match best_split {
            Some((feature, threshold, gain)) if gain > self.config.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| self.x[[i, feature]] <= threshold);

                if left_idx.is_empty() || right_idx.is_empty() {
                    return XGBNode::Leaf { weight: leaf_weight };
                }
                gains[feature] += gain;

                let left = self.build(&left_idx, depth + 1, gains);
                let right = self.build(&right_idx, depth + 1, gains);

                XGBNode::Split {
                    feature,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            _ => XGBNode::Leaf { weight: leaf_weight },
        }
    }

    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature: usize,
        g_total: f64,
        h_total: f64,
    ) -> Option<(usize, f64, f64)> {
        let x = self.x;
        let mut sorted_indices: Vec<usize> = indices.to_vec();
        sorted_indices.sort_by(|&a, &b| {
            x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(std::cmp::Ordering::Equal)
        });

        let lambda = self.config.reg_lambda;
        let parent_score = (g_total * g_total) / (h_total + lambda);
        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut best: Option<(f64, f64)> = None;

        for pos in 0..sorted_indices.len() - 1 {
            let idx = sorted_indices[pos];
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let next = x[[sorted_indices[pos + 1], feature]];
            if next - x[[idx, feature]] < 1e-12 {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5
                * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                    - parent_score);

            if best.map_or(true, |(g, _)| gain > g) {
                best = Some((gain, (x[[idx, feature]] + next) / 2.0));
            }
        }

        best.map(|(gain, threshold)| (feature, threshold, gain))
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio >= 1.0 {
        return indices;
    }
    let k = ((n as f64 * ratio).ceil() as usize).max(1);
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// XGBoost Classifier (binary logistic loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    gains: Vec<f64>,
    n_features: usize,
}

impl Default for XGBoostClassifier {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            gains: Vec::new(),
            n_features: 0,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.n_estimators == 0 {
            return Err(RacoonsError::invalid_parameter("n_estimators", 0, "must be at least 1"));
        }
        self.n_features = n_features;

        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.gains = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let probs = raw.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-16));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let builder = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                features: &col_indices,
                config: &self.config,
            };
            let tree = builder.build(&row_indices, 0, &mut self.gains);

            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += self.config.learning_rate * tree.predict(&row);
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    /// Raw margin (log-odds)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(RacoonsError::ModelNotFitted("xgboost".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(RacoonsError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            self.base_score
                + self
                    .trees
                    .iter()
                    .map(|t| self.config.learning_rate * t.predict(&row))
                    .sum::<f64>()
        })))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Normalised total gain per feature
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if !self.is_fitted() {
            return None;
        }
        let mut imp = Array1::from_vec(self.gains.clone());
        let total = imp.sum();
        if total > 0.0 {
            imp /= total;
        }
        Some(imp)
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .with("n_estimators", vec![ParamValue::Int(50), ParamValue::Int(100)])
            .with("max_depth", vec![ParamValue::Int(3), ParamValue::Int(6)])
            .with("learning_rate", vec![ParamValue::Float(0.1), ParamValue::Float(0.3)])
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let config = &mut self.config;
        match name {
            "n_estimators" => config.n_estimators = value.as_usize(name)?,
            "learning_rate" => config.learning_rate = value.as_f64(name)?,
            "max_depth" => config.max_depth = value.as_usize(name)?,
            "min_child_weight" => config.min_child_weight = value.as_f64(name)?,
            "reg_lambda" => config.reg_lambda = value.as_f64(name)?,
            "reg_alpha" => config.reg_alpha = value.as_f64(name)?,
            "gamma" => config.gamma = value.as_f64(name)?,
            "subsample" => config.subsample = value.as_f64(name)?,
            "colsample_bytree" => config.colsample_bytree = value.as_f64(name)?,
            "random_state" => config.random_state = Some(value.as_i64(name)? as u64),
            _ => {
                return Err(RacoonsError::invalid_parameter(name, value, "unknown xgboost parameter"))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 3), |(i, j)| {
            if j == 0 { i as f64 } else { ((i * 7 + j * 13) % 17) as f64 }
        });
        let y = Array1::from_iter((0..80).map(|i| if i >= 40 { 1.0 } else { 0.0 }));
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier_learns_signal() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 30,
            max_depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        let mean_pos = proba.iter().skip(40).sum::<f64>() / 40.0;
        let mean_neg = proba.iter().take(40).sum::<f64>() / 40.0;
        assert!(mean_pos > mean_neg);

        let importances = model.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances[0] > 0.5);
    }

    #[test]
    fn test_leaf_weight_soft_threshold() {
        assert_eq!(compute_leaf_weight(0.5, 2.0, 1.0, 1.0), 0.0);
        assert!((compute_leaf_weight(3.0, 2.0, 1.0, 1.0) + 2.0 / 3.0).abs() < 1e-12);
    }
}
