//! Classification drivers
//!
//! Each driver evaluates many (target, [feature], estimator) combinations
//! on one dataset and writes one result row per combination to a CSV file
//! in the output directory. Rows are returned in input order: target, then
//! estimator, then feature.

mod grid_search;

pub use grid_search::{
    grid_search_multivariate_classification, grid_search_multivariate_classification_with_config,
    search_best_model, SearchOutcome,
};

use crate::error::{RacoonsError, Result};
use crate::pipeline::builder::{validate_feature_selection_method, validate_sample_method};
use crate::pipeline::{ModelBuilder, Pipeline};
use crate::training::models::validate_estimator_names;
use crate::utils::data_loader::{features_and_targets_from_dataframe, DataSaver, Dataset};
use crate::validation::{cross_validate_with_config, CrossValidation, CrossValidationConfig};
use crate::visualization::{plot_feature_importances, plot_roc_curves, save_plot};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MULTIVARIATE_FILE: &str = "multivariate_classification.csv";
pub const UNIVARIATE_FILE: &str = "univariate_classification.csv";
pub const GRID_SEARCH_FILE: &str = "grid_search_multivariate_classification.csv";

/// Driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Outer cross-validation; 10 stratified folds by default
    pub cv: CrossValidationConfig,
    /// Seed for the random pipeline stages
    pub random_state: u64,
    /// Folds of the inner cross-validation scoring grid candidates
    pub inner_cv_folds: usize,
    /// Write feature-importance and ROC plots next to the CSV
    pub save_plots: bool,
    /// Evaluate combinations on the rayon pool
    pub parallel: bool,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            cv: CrossValidationConfig::default(),
            random_state: 42,
            inner_cv_folds: 3,
            save_plots: false,
            parallel: true,
        }
    }
}

impl ClassificationConfig {
    pub fn with_cv(mut self, cv: CrossValidationConfig) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_inner_cv_folds(mut self, folds: usize) -> Self {
        self.inner_cv_folds = folds;
        self
    }

    pub fn with_save_plots(mut self, save_plots: bool) -> Self {
        self.save_plots = save_plots;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    fn builder(&self) -> ModelBuilder {
        ModelBuilder::new().with_random_state(self.random_state)
    }
}

/// Aggregated metrics of one evaluated combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub target: String,
    /// Set by the univariate driver only
    pub feature: Option<String>,
    pub estimator: String,
    pub sample_method: Option<String>,
    pub feature_selection: Option<String>,
    pub n_samples: usize,
    pub n_positive: usize,
    /// Input feature columns of the combination, counted before one-hot
    /// expansion or feature selection
    pub n_features: usize,
    pub auc_mean: f64,
    pub auc_std: f64,
    pub f1_mean: f64,
    pub f1_std: f64,
    pub failed_folds: usize,
    /// JSON object of the winning parameters (grid search only)
    pub best_params: Option<String>,
    /// Inner-CV mean AUC of the winning candidate (grid search only)
    pub search_score: Option<f64>,
}

/// Which driver produced a set of rows; decides the table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Multivariate,
    Univariate,
    GridSearch,
}

/// Lay rows out as a table; the feature column only appears for univariate
/// rows, the search columns only for grid-search rows
pub fn results_to_dataframe(rows: &[ClassificationResult], kind: DriverKind) -> Result<DataFrame> {
    let strings = |f: fn(&ClassificationResult) -> Option<String>| -> Vec<Option<String>> {
        rows.iter().map(f).collect()
    };

    let mut columns = vec![Column::new(
        "target".into(),
        rows.iter().map(|r| r.target.clone()).collect::<Vec<_>>(),
    )];
    if kind == DriverKind::Univariate {
        columns.push(Column::new("feature".into(), strings(|r| r.feature.clone())));
    }
    columns.extend([
        Column::new("estimator".into(), rows.iter().map(|r| r.estimator.clone()).collect::<Vec<_>>()),
        Column::new("sample_method".into(), strings(|r| r.sample_method.clone())),
        Column::new("feature_selection".into(), strings(|r| r.feature_selection.clone())),
        Column::new("n_samples".into(), rows.iter().map(|r| r.n_samples as u64).collect::<Vec<_>>()),
        Column::new("n_positive".into(), rows.iter().map(|r| r.n_positive as u64).collect::<Vec<_>>()),
        Column::new("n_features".into(), rows.iter().map(|r| r.n_features as u64).collect::<Vec<_>>()),
        Column::new("auc_mean".into(), rows.iter().map(|r| r.auc_mean).collect::<Vec<_>>()),
        Column::new("auc_std".into(), rows.iter().map(|r| r.auc_std).collect::<Vec<_>>()),
        Column::new("f1_mean".into(), rows.iter().map(|r| r.f1_mean).collect::<Vec<_>>()),
        Column::new("f1_std".into(), rows.iter().map(|r| r.f1_std).collect::<Vec<_>>()),
        Column::new("failed_folds".into(), rows.iter().map(|r| r.failed_folds as u64).collect::<Vec<_>>()),
    ]);
    if kind == DriverKind::GridSearch {
        columns.push(Column::new("best_params".into(), strings(|r| r.best_params.clone())));
        columns.push(Column::new(
            "search_score".into(),
            rows.iter().map(|r| r.search_score).collect::<Vec<_>>(),
        ));
    }
    Ok(DataFrame::new(columns)?)
}

/// Names shared by one driver call
pub(crate) struct Methods<'a> {
    pub sample_method: Option<&'a str>,
    pub feature_selection_method: Option<&'a str>,
}

impl Methods<'_> {
    pub(crate) fn validate<E: AsRef<str>>(&self, estimators: &[E]) -> Result<()> {
        if estimators.is_empty() {
            return Err(RacoonsError::ConfigError("At least one estimator is required".to_string()));
        }
        validate_estimator_names(estimators)?;
        validate_sample_method(self.sample_method)?;
        validate_feature_selection_method(self.feature_selection_method)
    }
}

pub(crate) fn prepare_output_dir(output_path: &Path) -> Result<()> {
    std::fs::create_dir_all(output_path)?;
    Ok(())
}

pub(crate) fn persist(df: &mut DataFrame, output_path: &Path, file_name: &str) -> Result<PathBuf> {
    let path = output_path.join(file_name);
    DataSaver::save_csv(df, &path)?;
    info!(path = %path.display(), rows = df.height(), "Wrote classification results");
    Ok(path)
}

/// Run `f` over `items` in order, on the rayon pool when `parallel` is set
pub(crate) fn map_in_order<T, R, F>(items: &[T], parallel: bool, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync + Send,
{
    if parallel {
        items.par_iter().map(&f).collect()
    } else {
        items.iter().map(&f).collect()
    }
}

/// Summarise a cross-validation run into a result row
pub(crate) fn result_row(
    target: &str,
    feature: Option<&str>,
    model: &Pipeline,
    methods: &Methods<'_>,
    y: &ndarray::Array1<f64>,
    n_features: usize,
    cv: &CrossValidation,
) -> ClassificationResult {
    let (auc_mean, auc_std) = cv.auc_summary();
    let (f1_mean, f1_std) = cv.f1_summary();
    ClassificationResult {
        target: target.to_string(),
        feature: feature.map(str::to_string),
        estimator: model.estimator().map(|e| e.name()).unwrap_or("unknown").to_string(),
        sample_method: methods.sample_method.map(str::to_string),
        feature_selection: methods.feature_selection_method.map(str::to_string),
        n_samples: y.len(),
        n_positive: y.iter().filter(|&&v| v >= 0.5).count(),
        n_features,
        auc_mean,
        auc_std,
        f1_mean,
        f1_std,
        failed_folds: cv.n_failed(),
        best_params: None,
        search_score: None,
    }
}

/// Write the importance and ROC plots of one row
pub(crate) fn save_row_plots(output_path: &Path, stem: &str, cv: &CrossValidation) -> Result<()> {
    let dir = output_path.join("plots");
    std::fs::create_dir_all(&dir)?;
    if cv.feature_importances.width() > 0 {
        let plot = plot_feature_importances(&cv.feature_importances)?;
        save_plot(&plot, dir.join(format!("{}_feature_importance.html", stem)))?;
    }
    let roc = plot_roc_curves(cv, stem)?;
    save_plot(&roc, dir.join(format!("{}_roc.html", stem)))?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn evaluate(
    dataset: &Dataset,
    target: &str,
    features: &[String],
    estimator: &str,
    methods: &Methods<'_>,
    config: &ClassificationConfig,
    output_path: &Path,
    univariate: bool,
) -> Result<ClassificationResult> {
    let y = dataset.target(target)?;
    let (x, scale_levels) = dataset.feature_subset(features)?;
    let model = config.builder().build(
        &scale_levels,
        methods.sample_method,
        methods.feature_selection_method,
        estimator,
    )?;
    let cv = cross_validate_with_config(&model, &x, &y, &config.cv)?;

    let feature = if univariate { features.first().map(String::as_str) } else { None };
    let row = result_row(target, feature, &model, methods, &y, features.len(), &cv);
    debug!(
        outcome = target,
        estimator,
        feature = feature.unwrap_or("all"),
        auc_mean = row.auc_mean,
        "Evaluated combination"
    );

    if config.save_plots {
        let stem = match feature {
            Some(f) => format!("{}_{}_{}", target, estimator, f),
            None => format!("{}_{}", target, estimator),
        };
        save_row_plots(output_path, &stem, &cv)?;
    }
    Ok(row)
}

/// Evaluate every estimator on all features against every target
pub fn multivariate_classification<S: AsRef<str>, E: AsRef<str>>(
    df: &DataFrame,
    feature_cols: &[S],
    target_cols: &[S],
    feature_selection_method: Option<&str>,
    sample_method: Option<&str>,
    estimators: &[E],
    output_path: impl AsRef<Path>,
) -> Result<DataFrame> {
    multivariate_classification_with_config(
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
pub fn multivariate_classification_with_config<S: AsRef<str>, E: AsRef<str>>(
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

    let features = dataset.feature_names.clone();
    let combinations: Vec<(&str, &str)> = dataset
        .target_names
        .iter()
        .flat_map(|t| estimators.iter().map(move |e| (t.as_str(), e.as_ref())))
        .collect();
    info!(
        n_combinations = combinations.len(),
        n_samples = dataset.n_samples(),
        "Running multivariate classification"
    );

    let rows = map_in_order(&combinations, config.parallel, |&(target, estimator)| {
        evaluate(&dataset, target, &features, estimator, &methods, config, output_path, false)
    })?;

    let mut table = results_to_dataframe(&rows, DriverKind::Multivariate)?;
    persist(&mut table, output_path, MULTIVARIATE_FILE)?;
    Ok(table)
}

/// Evaluate every estimator on each single feature against every target
pub fn univariate_classification<S: AsRef<str>, E: AsRef<str>>(
    df: &DataFrame,
    feature_cols: &[S],
    target_cols: &[S],
    sample_method: Option<&str>,
    estimators: &[E],
    output_path: impl AsRef<Path>,
) -> Result<DataFrame> {
    univariate_classification_with_config(
        df,
        feature_cols,
        target_cols,
        sample_method,
        estimators,
        output_path,
        &ClassificationConfig::default(),
    )
}

pub fn univariate_classification_with_config<S: AsRef<str>, E: AsRef<str>>(
    df: &DataFrame,
    feature_cols: &[S],
    target_cols: &[S],
    sample_method: Option<&str>,
    estimators: &[E],
    output_path: impl AsRef<Path>,
    config: &ClassificationConfig,
) -> Result<DataFrame> {
    let output_path = output_path.as_ref();
    let methods = Methods {
        sample_method,
        feature_selection_method: None,
    };
    methods.validate(estimators)?;
    let dataset = features_and_targets_from_dataframe(df, feature_cols, target_cols)?;
    prepare_output_dir(output_path)?;

    let mut combinations: Vec<(&str, &str, [String; 1])> = Vec::new();
    for target in &dataset.target_names {
        for estimator in estimators {
            for feature in &dataset.feature_names {
                combinations.push((target.as_str(), estimator.as_ref(), [feature.clone()]));
            }
        }
    }
    info!(
        n_combinations = combinations.len(),
        n_samples = dataset.n_samples(),
        "Running univariate classification"
    );

    let rows = map_in_order(&combinations, config.parallel, |(target, estimator, feature)| {
        evaluate(&dataset, target, feature, estimator, &methods, config, output_path, true)
    })?;

    let mut table = results_to_dataframe(&rows, DriverKind::Univariate)?;
    persist(&mut table, output_path, UNIVARIATE_FILE)?;
    Ok(table)
}
