//! Cross-validation of pipelines
//!
//! Every fold fits an independent copy of the pipeline on its training rows
//! only, then scores the held-out rows. Resampling and feature selection
//! therefore never see validation data.

pub mod metrics;

pub use metrics::{auc, f1_score, interp, mean_curve, mean_std, roc_auc_score, roc_curve, RocCurve};

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::ParamGrid;
use crate::pipeline::Pipeline;
use crate::training::cross_validation::{CVSplit, CrossValidator};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Folds used by [`cross_validate_model`]
pub const N_FOLDS: usize = 10;
/// Shuffle seed used by [`cross_validate_model`]
pub const CV_RANDOM_STATE: u64 = 42;
/// Resolution of the shared false-positive-rate grid
pub const N_FPR_POINTS: usize = 100;

/// Cross-validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    pub n_folds: usize,
    pub random_state: u64,
    pub n_fpr_points: usize,
    /// Evaluate folds on the rayon pool
    pub parallel: bool,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            n_folds: N_FOLDS,
            random_state: CV_RANDOM_STATE,
            n_fpr_points: N_FPR_POINTS,
            parallel: true,
        }
    }
}

impl CrossValidationConfig {
    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn splits(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        CrossValidator::new(self.n_folds, true)
            .with_random_state(self.random_state)
            .split(y)
    }
}

/// Per-fold results of a cross-validation run.
///
/// `tprs`, `aucs` and `f1_scores` always hold one entry per fold. A fold whose
/// validation rows contain a single class has NaN for its AUC and TPR curve
/// and a matching entry in `fold_errors`.
#[derive(Debug)]
pub struct CrossValidation {
    /// Shared false-positive-rate grid of every TPR curve
    pub mean_fpr: Array1<f64>,
    pub tprs: Vec<Array1<f64>>,
    pub aucs: Vec<f64>,
    pub f1_scores: Vec<f64>,
    /// One row per fold, one column per feature selected in any fold;
    /// null where a fold did not select the feature
    pub feature_importances: DataFrame,
    /// One `FoldError` per fold that could not be scored by AUC
    pub fold_errors: Vec<RacoonsError>,
}

impl CrossValidation {
    pub fn n_folds(&self) -> usize {
        self.aucs.len()
    }

    pub fn n_failed(&self) -> usize {
        self.fold_errors.len()
    }

    /// Mean and std of the finite fold AUCs
    pub fn auc_summary(&self) -> (f64, f64) {
        mean_std(&self.aucs)
    }

    pub fn f1_summary(&self) -> (f64, f64) {
        mean_std(&self.f1_scores)
    }

    /// Point-wise mean TPR over the scored folds, ending at 1
    pub fn mean_tpr(&self) -> Array1<f64> {
        let mut mean = mean_curve(&self.tprs, self.mean_fpr.len());
        if let Some(last) = mean.last_mut() {
            if last.is_finite() {
                *last = 1.0;
            }
        }
        mean
    }
}

struct FoldOutcome {
    tpr: Array1<f64>,
    auc: f64,
    f1: f64,
    importances: Vec<(String, f64)>,
    error: Option<RacoonsError>,
}

/// Stratified 10-fold cross-validation with seed 42
pub fn cross_validate_model(model: &Pipeline, x: &Array2<f64>, y: &Array1<f64>) -> Result<CrossValidation> {
    cross_validate_with_config(model, x, y, &CrossValidationConfig::default())
}

pub fn cross_validate_with_config(
    model: &Pipeline,
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &CrossValidationConfig,
) -> Result<CrossValidation> {
    if x.nrows() != y.len() {
        return Err(RacoonsError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    let splits = config.splits(y)?;
    let mean_fpr = Array1::linspace(0.0, 1.0, config.n_fpr_points);

    let outcomes: Vec<FoldOutcome> = if config.parallel {
        splits
            .par_iter()
            .map(|split| evaluate_fold(model, x, y, split, &mean_fpr))
            .collect::<Result<Vec<_>>>()?
    } else {
        splits
            .iter()
            .map(|split| evaluate_fold(model, x, y, split, &mean_fpr))
            .collect::<Result<Vec<_>>>()?
    };

    let feature_importances = importance_table(outcomes.iter().map(|o| o.importances.as_slice()))?;

    let mut cv = CrossValidation {
        mean_fpr,
        tprs: Vec::with_capacity(outcomes.len()),
        aucs: Vec::with_capacity(outcomes.len()),
        f1_scores: Vec::with_capacity(outcomes.len()),
        feature_importances,
        fold_errors: Vec::new(),
    };
    for outcome in outcomes {
        cv.tprs.push(outcome.tpr);
        cv.aucs.push(outcome.auc);
        cv.f1_scores.push(outcome.f1);
        if let Some(err) = outcome.error {
            cv.fold_errors.push(err);
        }
    }

    let (auc_mean, auc_std) = cv.auc_summary();
    debug!(
        estimator = model.estimator().map(|e| e.name()).unwrap_or("unknown"),
        auc_mean,
        auc_std,
        failed_folds = cv.n_failed(),
        "Cross-validation finished"
    );
    Ok(cv)
}

/// Fit an independent copy of `model` on the given rows only
pub fn fit_fold(model: &Pipeline, x: &Array2<f64>, y: &Array1<f64>, train_indices: &[usize]) -> Result<Pipeline> {
    let x_train = x.select(Axis(0), train_indices);
    let y_train = y.select(Axis(0), train_indices);
    let mut fold_model = model.clone();
    fold_model.fit(&x_train, &y_train)?;
    Ok(fold_model)
}

fn evaluate_fold(
    model: &Pipeline,
    x: &Array2<f64>,
    y: &Array1<f64>,
    split: &CVSplit,
    mean_fpr: &Array1<f64>,
) -> Result<FoldOutcome> {
    let fitted = fit_fold(model, x, y, &split.train_indices)?;

    let x_val = x.select(Axis(0), &split.test_indices);
    let y_val = y.select(Axis(0), &split.test_indices);
    let proba = fitted.predict_proba(&x_val)?;
    let predictions = proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
    let f1 = f1_score(&y_val, &predictions)?;

    let positives = y_val.iter().filter(|&&v| v >= 0.5).count();
    let (tpr, auc_score, error) = if positives == 0 || positives == y_val.len() {
        let err = RacoonsError::FoldError {
            fold: split.fold_idx,
            reason: "validation split contains a single class".to_string(),
        };
        warn!(fold = split.fold_idx, n_val = y_val.len(), "{}", err);
        (Array1::from_elem(mean_fpr.len(), f64::NAN), f64::NAN, Some(err))
    } else {
        let roc = roc_curve(&y_val, &proba)?;
        let mut tpr = interp(mean_fpr, &roc.fpr, &roc.tpr)?;
        if let Some(first) = tpr.first_mut() {
            *first = 0.0;
        }
        (tpr, auc(&roc.fpr, &roc.tpr)?, None)
    };

    Ok(FoldOutcome {
        tpr,
        auc: auc_score,
        f1,
        importances: fitted.feature_importances()?,
        error,
    })
}

/// Fold-by-feature table; columns in order of first appearance
fn importance_table<'a>(folds: impl Iterator<Item = &'a [(String, f64)]>) -> Result<DataFrame> {
    let folds: Vec<&[(String, f64)]> = folds.collect();
    let mut names: Vec<&str> = Vec::new();
    for fold in &folds {
        for (name, _) in fold.iter() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .map(|&name| {
            let values: Vec<Option<f64>> = folds
                .iter()
                .map(|fold| fold.iter().find(|(n, _)| n == name).map(|(_, v)| *v))
                .collect();
            Column::new(name.into(), values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Stage-qualified search grid of every stage present in `model`
pub fn get_param_grid(model: &Pipeline) -> ParamGrid {
    model.param_grid()
}

/// One-row table of the fitted estimator's importances, one column per
/// entry of its `feature_names_in`
pub fn get_feature_importance(model: &Pipeline) -> Result<DataFrame> {
    let importances = model.feature_importances()?;
    let columns: Vec<Column> = importances
        .into_iter()
        .map(|(name, value)| Column::new(name.into(), vec![value]))
        .collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_model;
    use crate::preprocessing::{ScaleLevel, ScaleLevels};

    fn levels() -> ScaleLevels {
        ScaleLevels::from_pairs(&[("a", ScaleLevel::Continuous), ("b", ScaleLevel::Continuous)])
    }

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 + ((i * 13) % 7) as f64
            } else {
                ((i * 31) % 11) as f64
            }
        });
        let y = Array1::from_iter((0..n).map(|i| if i >= n / 2 { 1.0 } else { 0.0 }));
        (x, y)
    }

    #[test]
    fn test_ten_folds() {
        let (x, y) = data(60);
        let model = build_model(&levels(), None, None, "logistic_regression").unwrap();
        let cv = cross_validate_model(&model, &x, &y).unwrap();

        assert_eq!(cv.tprs.len(), 10);
        assert_eq!(cv.aucs.len(), 10);
        assert_eq!(cv.f1_scores.len(), 10);
        assert_eq!(cv.feature_importances.height(), 10);
        let columns: Vec<String> = cv
            .feature_importances
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(columns, vec!["a", "b"]);
        assert!(cv.fold_errors.is_empty());
        for tpr in &cv.tprs {
            assert_eq!(tpr.len(), N_FPR_POINTS);
            assert_eq!(tpr[0], 0.0);
        }
        assert!(cv.auc_summary().0 > 0.8);
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = data(40);
        let model = build_model(&levels(), Some("smote"), None, "decision_tree").unwrap();
        let a = cross_validate_model(&model, &x, &y).unwrap();
        let b = cross_validate_model(&model, &x, &y).unwrap();
        assert_eq!(a.f1_scores, b.f1_scores);
    }

    #[test]
    fn test_single_class_folds_are_recorded() {
        // 10 folds over 12 rows with only 2 positives
        let (x, _) = data(12);
        let y = Array1::from_iter((0..12).map(|i| if i < 2 { 1.0 } else { 0.0 }));
        let model = build_model(&levels(), None, None, "decision_tree").unwrap();
        let cv = cross_validate_model(&model, &x, &y).unwrap();

        assert_eq!(cv.aucs.len(), 10);
        assert_eq!(cv.n_failed(), 8);
        assert_eq!(cv.aucs.iter().filter(|a| a.is_nan()).count(), 8);
        assert!(matches!(cv.fold_errors[0], RacoonsError::FoldError { .. }));
    }

    #[test]
    fn test_too_few_samples() {
        let (x, y) = data(8);
        let model = build_model(&levels(), None, None, "decision_tree").unwrap();
        assert!(cross_validate_model(&model, &x, &y).is_err());
    }

    #[test]
    fn test_fold_model_only_sees_training_rows() {
        let (x, y) = data(20);
        let model = build_model(&levels(), None, None, "logistic_regression").unwrap();
        let train: Vec<usize> = (0..20).filter(|i| i % 4 != 0).collect();
        let fitted = fit_fold(&model, &x, &y, &train).unwrap();

        match fitted.step(crate::pipeline::PREPROCESSOR) {
            Some(crate::pipeline::Stage::Preprocessor(p)) => {
                let out = p.transform(&x.select(Axis(0), &train)).unwrap();
                assert!(out.column(0).mean().unwrap().abs() < 1e-9);
            }
            other => panic!("unexpected stage {:?}", other),
        }
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_feature_importance_matches_feature_names_in() {
        let (x, y) = data(40);
        let mut model = build_model(&levels(), None, Some("lasso"), "random_forest").unwrap();
        assert!(matches!(
            get_feature_importance(&model),
            Err(RacoonsError::ModelNotFitted(_))
        ));
        model.fit(&x, &y).unwrap();

        let table = get_feature_importance(&model).unwrap();
        let columns: Vec<String> = table.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(columns, model.feature_names_in().unwrap());
        assert_eq!(table.height(), 1);
    }

    #[test]
    fn test_param_grid_shapes() {
        let plain = build_model(&levels(), None, None, "logistic_regression").unwrap();
        let grid = get_param_grid(&plain);
        assert!(grid.contains_key("estimator__penalty"));
        assert!(!grid.contains_key("feature_selection__estimator__C"));
        assert!(!grid.contains_key("sampler__k_neighbors"));

        let selected = build_model(&levels(), None, Some("lasso"), "logistic_regression").unwrap();
        let grid = get_param_grid(&selected);
        assert!(grid.contains_key("feature_selection__estimator__C"));
        assert!(grid.contains_key("feature_selection__estimator__solver"));

        let sampled = build_model(&levels(), Some("smote"), None, "logistic_regression").unwrap();
        assert!(get_param_grid(&sampled).contains_key("sampler__k_neighbors"));
        assert!(grid.keys().all(|k| k.contains("__")));
    }
}
