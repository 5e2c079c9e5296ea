//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{ParamGrid, ParamValue};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Maximum features per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Worker threads for tree building; -1 uses the global rayon pool
    pub n_jobs: i64,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            n_jobs: -1,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: i64) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(RacoonsError::invalid_parameter("n_estimators", 0, "must be at least 1"));
        }

        self.n_features = x.ncols();
        let trees = match self.n_jobs {
            n if n >= 1 => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n as usize).build()?;
                pool.install(|| self.build_trees(x, y))?
            }
            _ => self.build_trees(x, y)?,
        };
        self.trees = trees;
        debug!(n_trees = self.trees.len(), n_jobs = self.n_jobs, "Random forest fitted");

        self.compute_feature_importances();
        Ok(self)
    }

    fn build_trees(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<DecisionTree>> {
        let n_samples = x.nrows();
        let max_features = self.compute_max_features(x.ncols());
        let base_seed = self.random_state.unwrap_or(42);

        (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                tree.max_depth = self.max_depth;
                tree.fit_indices(x, y, &sample_indices)?;
                Ok(tree)
            })
            .collect()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for imp in self.trees.iter().filter_map(|t| t.feature_importances()) {
            total += imp;
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }

    /// Positive-class probability, averaged over the trees' leaf fractions
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(RacoonsError::ModelNotFitted("random forest".to_string()));
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<_>>()?;

        let mut proba = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            proba += p;
        }
        Ok(proba / per_tree.len() as f64)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn param_grid() -> ParamGrid {
        ParamGrid::new()
            .with("n_estimators", vec![ParamValue::Int(50), ParamValue::Int(100)])
            .with("n_jobs", vec![ParamValue::Int(1), ParamValue::Int(-1)])
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "n_jobs" => {
                let n = value.as_i64(name)?;
                if n == 0 || n < -1 {
                    return Err(RacoonsError::invalid_parameter(name, n, "expected -1 or a positive count"));
                }
                self.n_jobs = n;
            }
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "criterion" => self.criterion = Criterion::parse(value.as_str(name)?)?,
            "max_features" => {
                self.max_features = match value {
                    ParamValue::Str(s) if s == "sqrt" => MaxFeatures::Sqrt,
                    ParamValue::Str(s) if s == "log2" => MaxFeatures::Log2,
                    ParamValue::None => MaxFeatures::All,
                    ParamValue::Float(f) => MaxFeatures::Fraction(*f),
                    other => MaxFeatures::Fixed(other.as_usize(name)?),
                }
            }
            "bootstrap" => self.bootstrap = value.as_str(name)? == "true",
            "random_state" => self.random_state = Some(value.as_i64(name)? as u64),
            _ => {
                return Err(RacoonsError::invalid_parameter(
                    name,
                    value,
                    "unknown random_forest parameter",
                ))
            }
        }
        Ok(())
    }
}
