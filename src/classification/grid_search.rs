//! Exhaustive grid search over pipeline hyperparameters

use super::{
    map_in_order, persist, prepare_output_dir, result_row, results_to_dataframe, save_row_plots,
    ClassificationConfig, DriverKind, Methods, GRID_SEARCH_FILE,
};
use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::ParamSet;
use crate::pipeline::Pipeline;
use crate::utils::data_loader::features_and_targets_from_dataframe;
use crate::validation::{cross_validate_with_config, CrossValidationConfig};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{debug, info};

/// Best candidate of one grid search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Unfit pipeline with the winning parameters applied
    pub model: Pipeline,
    pub params: ParamSet,
    /// Mean inner-CV AUC of the winner
    pub score: f64,
    pub n_candidates: usize,
}

/// Index of the first maximal score; NaN never wins over a number
fn first_best(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        let current = scores[best];
        if score > current || (current.is_nan() && !score.is_nan()) {
            best = i;
        }
    }
    best
}

/// Score every point of `template`'s grid by mean AUC over `inner` folds
/// and keep the best; ties go to the earlier candidate
pub fn search_best_model(
    template: &Pipeline,
    x: &Array2<f64>,
    y: &Array1<f64>,
    inner: &CrossValidationConfig,
    parallel: bool,
) -> Result<SearchOutcome> {
    let candidates = template.param_grid().candidates();
    let scores = map_in_order(&candidates, parallel, |params| {
        let mut model = template.clone();
        model.set_params(params)?;
        Ok(cross_validate_with_config(&model, x, y, inner)?.auc_summary().0)
    })?;

    let best = first_best(&scores);
    let params = candidates.get(best).cloned().unwrap_or_default();
    let mut model = template.clone();
    model.set_params(&params)?;

    debug!(
        estimator = template.estimator().map(|e| e.name()).unwrap_or("unknown"),
        n_candidates = candidates.len(),
        score = scores.get(best).copied().unwrap_or(f64::NAN),
        "Grid search finished"
    );
    Ok(SearchOutcome {
        model,
        params,
        score: scores.get(best).copied().unwrap_or(f64::NAN),
        n_candidates: candidates.len(),
    })
}

/// One row per target: the best (estimator, parameters) pair found by grid
/// search, evaluated with the outer cross-validation
pub fn grid_search_multivariate_classification<S: AsRef<str>, E: AsRef<str>>(
    df: &DataFrame,
    feature_cols: &[S],
    target_cols: &[S],
    feature_selection_method: Option<&str>,
    sample_method: Option<&str>,
    estimators: &[E],
    output_path: impl AsRef<Path>,
) -> Result<DataFrame> {
    grid_search_multivariate_classification_with_config(
        df,
        feature_cols,
        target_cols,
        feature_selection_method,
        sample_method,
        estimators,
        output_path,
        &ClassificationConfig::default(),
    )
}

#[allow(clippy::too_many_arguments)]
pub fn grid_search_multivariate_classification_with_config<S: AsRef<str>, E: AsRef<str>>(
    df: &DataFrame,
    feature_cols: &[S],
    target_cols: &[S],
    feature_selection_method: Option<&str>,
    sample_method: Option<&str>,
    estimators: &[E],
    output_path: impl AsRef<Path>,
    config: &ClassificationConfig,
) -> Result<DataFrame> {
    let output_path = output_path.as_ref();
    let methods = Methods {
        sample_method,
        feature_selection_method,
    };
    methods.validate(estimators)?;
    let dataset = features_and_targets_from_dataframe(df, feature_cols, target_cols)?;
    prepare_output_dir(output_path)?;

    let inner = config
        .cv
        .clone()
        .with_n_folds(config.inner_cv_folds)
        .with_parallel(false);
    let estimators: Vec<&str> = estimators.iter().map(|e| e.as_ref()).collect();
    info!(
        n_targets = dataset.target_names.len(),
        n_estimators = estimators.len(),
        inner_folds = inner.n_folds,
        "Running grid search classification"
    );

    let rows = map_in_order(&dataset.target_names, config.parallel, |target| {
        let y = dataset.target(target)?;
        let x = &dataset.x;

        let mut best: Option<SearchOutcome> = None;
        for estimator in &estimators {
            let template = config.builder().build(
                &dataset.scale_levels,
                sample_method,
                feature_selection_method,
                estimator,
            )?;
            let outcome = search_best_model(&template, x, &y, &inner, config.parallel)?;
            let improves = match &best {
                None => true,
                Some(current) => first_best(&[current.score, outcome.score]) == 1,
            };
            if improves {
                best = Some(outcome);
            }
        }

        let winner = best.ok_or_else(|| {
            RacoonsError::ComputationError(format!("No grid search candidate for '{}'", target))
        })?;
        let cv = cross_validate_with_config(&winner.model, x, &y, &config.cv)?;
        let mut row = result_row(
            target,
            None,
            &winner.model,
            &methods,
            &y,
            dataset.feature_names.len(),
            &cv,
        );
        row.best_params = Some(serde_json::to_string(&winner.params)?);
        row.search_score = Some(winner.score);
        info!(
            outcome = target.as_str(),
            estimator = %row.estimator,
            search_score = winner.score,
            auc_mean = row.auc_mean,
            "Selected best model"
        );

        if config.save_plots {
            save_row_plots(output_path, &format!("{}_grid_search", target), &cv)?;
        }
        Ok(row)
    })?;

    let mut table = results_to_dataframe(&rows, DriverKind::GridSearch)?;
    persist(&mut table, output_path, GRID_SEARCH_FILE)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_model;
    use crate::preprocessing::{ScaleLevel, ScaleLevels};

    #[test]
    fn test_first_best_prefers_earliest() {
        assert_eq!(first_best(&[0.7, 0.9, 0.9]), 1);
        assert_eq!(first_best(&[f64::NAN, 0.5]), 1);
        assert_eq!(first_best(&[0.5, f64::NAN]), 0);
        assert_eq!(first_best(&[f64::NAN, f64::NAN]), 0);
    }

    #[test]
    fn test_search_best_model() {
        let levels = ScaleLevels::from_pairs(&[("a", ScaleLevel::Continuous)]);
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64 + ((i * 7) % 5) as f64);
        let y = Array1::from_iter((0..30).map(|i| if i >= 15 { 1.0 } else { 0.0 }));
        let template = build_model(&levels, None, None, "decision_tree").unwrap();

        let inner = CrossValidationConfig::default().with_n_folds(3).with_parallel(false);
        let outcome = search_best_model(&template, &x, &y, &inner, false).unwrap();
        assert_eq!(outcome.n_candidates, 6);
        assert!(outcome.params.contains_key("estimator__criterion"));
        assert!(outcome.params.contains_key("estimator__max_depth"));
        assert!(outcome.score > 0.5);
        assert!(!outcome.model.is_fitted());
    }
}
