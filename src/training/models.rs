//! Estimator registry
//!
//! Maps the configuration names used throughout the crate to estimator
//! constructors. Only binary classifiers are registered.

use super::adaboost::AdaBoostClassifier;
use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::xgboost::XGBoostClassifier;
use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{ParamGrid, ParamValue};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Registry key of the k-nearest-neighbours classifier, which is not offered
pub const DISABLED_CLASSIFIERS: &[&str] = &["k_neighbors"];

/// Constructor table, in the order estimators are reported
pub const CLASSIFIERS: &[(&str, fn() -> Estimator)] = &[
    ("logistic_regression", logistic_regression),
    ("random_forest", random_forest),
    ("ada_boost", ada_boost),
    ("gradient_boosting", gradient_boosting),
    ("decision_tree", decision_tree),
    ("xgboost", xgboost),
];

fn logistic_regression() -> Estimator {
    Estimator::LogisticRegression(LogisticRegression::new())
}

fn random_forest() -> Estimator {
    Estimator::RandomForest(RandomForest::new(100))
}

fn ada_boost() -> Estimator {
    Estimator::AdaBoost(AdaBoostClassifier::default())
}

fn gradient_boosting() -> Estimator {
    Estimator::GradientBoosting(GradientBoostingClassifier::default())
}

fn decision_tree() -> Estimator {
    Estimator::DecisionTree(DecisionTree::new_classifier())
}

fn xgboost() -> Estimator {
    Estimator::XGBoost(XGBoostClassifier::default())
}

/// Names of every registered classifier
pub fn available_classifiers() -> Vec<&'static str> {
    CLASSIFIERS.iter().map(|(name, _)| *name).collect()
}

/// Build an unfit estimator by registry name
pub fn build_estimator(name: &str) -> Result<Estimator> {
    if DISABLED_CLASSIFIERS.contains(&name) {
        return Err(RacoonsError::ConfigError(format!(
            "Estimator '{}' is currently disabled",
            name
        )));
    }
    CLASSIFIERS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, ctor)| ctor())
        .ok_or_else(|| {
            RacoonsError::ConfigError(format!(
                "Unknown estimator '{}', expected one of: {}",
                name,
                available_classifiers().join(", ")
            ))
        })
}

/// Check that every name is a registered estimator
pub fn validate_estimator_names<S: AsRef<str>>(names: &[S]) -> Result<()> {
    for name in names {
        build_estimator(name.as_ref())?;
    }
    Ok(())
}

/// A binary classifier from the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    AdaBoost(AdaBoostClassifier),
    GradientBoosting(GradientBoostingClassifier),
    DecisionTree(DecisionTree),
    XGBoost(XGBoostClassifier),
}

impl Estimator {
    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression(_) => "logistic_regression",
            Estimator::RandomForest(_) => "random_forest",
            Estimator::AdaBoost(_) => "ada_boost",
            Estimator::GradientBoosting(_) => "gradient_boosting",
            Estimator::DecisionTree(_) => "decision_tree",
            Estimator::XGBoost(_) => "xgboost",
        }
    }

    /// Seed the estimators that draw random numbers while fitting
    pub fn set_random_state(&mut self, seed: u64) {
        match self {
            Estimator::RandomForest(m) => m.random_state = Some(seed),
            Estimator::GradientBoosting(m) => m.config.random_state = Some(seed),
            Estimator::DecisionTree(m) => m.random_state = Some(seed),
            Estimator::XGBoost(m) => m.config.random_state = Some(seed),
            Estimator::LogisticRegression(_) | Estimator::AdaBoost(_) => {}
        }
    }

    /// Fit on 0/1 labels; both classes must be present
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(RacoonsError::ValidationError(
                "Targets must be binary 0/1 labels".to_string(),
            ));
        }
        let positives = y.iter().filter(|&&v| v == 1.0).count();
        if positives == 0 || positives == y.len() {
            return Err(RacoonsError::ValidationError(format!(
                "{} needs samples of both classes to fit",
                self.name()
            )));
        }

        match self {
            Estimator::LogisticRegression(m) => {
                m.fit(x, y)?;
            }
            Estimator::RandomForest(m) => {
                m.fit(x, y)?;
            }
            Estimator::AdaBoost(m) => {
                m.fit(x, y)?;
            }
            Estimator::GradientBoosting(m) => m.fit(x, y)?,
            Estimator::DecisionTree(m) => {
                m.fit(x, y)?;
            }
            Estimator::XGBoost(m) => m.fit(x, y)?,
        }
        Ok(())
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.predict_proba(x),
            Estimator::RandomForest(m) => m.predict_proba(x),
            Estimator::AdaBoost(m) => m.predict_proba(x),
            Estimator::GradientBoosting(m) => m.predict_proba(x),
            Estimator::DecisionTree(m) => m.predict_proba(x),
            Estimator::XGBoost(m) => m.predict_proba(x),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Per-feature importances of a fitted estimator
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            Estimator::LogisticRegression(m) => m.feature_importances(),
            Estimator::RandomForest(m) => m.feature_importances().cloned(),
            Estimator::AdaBoost(m) => m.feature_importances(),
            Estimator::GradientBoosting(m) => {
                if m.is_fitted() {
                    Some(Array1::from_vec(m.feature_importances().to_vec()))
                } else {
                    None
                }
            }
            Estimator::DecisionTree(m) => m.feature_importances().cloned(),
            Estimator::XGBoost(m) => m.feature_importances(),
        }
    }

    /// Search grid over this estimator's own parameters (unprefixed)
    pub fn param_grid(&self) -> ParamGrid {
        match self {
            Estimator::LogisticRegression(_) => LogisticRegression::param_grid(),
            Estimator::RandomForest(_) => RandomForest::param_grid(),
            Estimator::AdaBoost(_) => AdaBoostClassifier::param_grid(),
            Estimator::GradientBoosting(_) => GradientBoostingClassifier::param_grid(),
            Estimator::DecisionTree(_) => DecisionTree::param_grid(),
            Estimator::XGBoost(_) => XGBoostClassifier::param_grid(),
        }
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match self {
            Estimator::LogisticRegression(m) => m.set_param(name, value),
            Estimator::RandomForest(m) => m.set_param(name, value),
            Estimator::AdaBoost(m) => m.set_param(name, value),
            Estimator::GradientBoosting(m) => m.set_param(name, value),
            Estimator::DecisionTree(m) => m.set_param(name, value),
            Estimator::XGBoost(m) => m.set_param(name, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_registry_keys() {
        assert_eq!(
            available_classifiers(),
            vec![
                "logistic_regression",
                "random_forest",
                "ada_boost",
                "gradient_boosting",
                "decision_tree",
                "xgboost"
            ]
        );
        for name in available_classifiers() {
            assert_eq!(build_estimator(name).unwrap().name(), name);
        }
    }

    #[test]
    fn test_unknown_and_disabled() {
        assert!(matches!(build_estimator("svm"), Err(RacoonsError::ConfigError(_))));
        assert!(matches!(build_estimator("k_neighbors"), Err(RacoonsError::ConfigError(_))));
        assert!(validate_estimator_names(&["xgboost", "nope"]).is_err());
    }

    #[test]
    fn test_fit_rejects_single_class() {
        let mut est = build_estimator("decision_tree").unwrap();
        let x = array![[1.0], [2.0], [3.0]];
        assert!(est.fit(&x, &array![1.0, 1.0, 1.0]).is_err());
        assert!(est.fit(&x, &array![0.0, 2.0, 1.0]).is_err());
        est.fit(&x, &array![0.0, 1.0, 1.0]).unwrap();
        assert_eq!(est.feature_importances().unwrap().len(), 1);
    }

    #[test]
    fn test_every_estimator_fits_and_scores() {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| {
            if j == 0 { i as f64 } else { ((i * 5) % 3) as f64 * 0.3 }
        });
        let y = Array1::from_iter((0..12).map(|i| if i >= 6 { 1.0 } else { 0.0 }));
        for name in available_classifiers() {
            let mut est = build_estimator(name).unwrap();
            est.set_random_state(1);
            est.fit(&x, &y).unwrap();
            let proba = est.predict_proba(&x).unwrap();
            assert_eq!(proba.len(), 12, "{}", name);
            assert!(proba[11] > proba[0], "{} does not rank the classes", name);
            assert_eq!(est.feature_importances().unwrap().len(), 2, "{}", name);
        }
    }
}
