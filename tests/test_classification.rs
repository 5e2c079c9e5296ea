//! Integration test: classification drivers end-to-end

use racoons::classification::{
    grid_search_multivariate_classification, multivariate_classification, univariate_classification,
    GRID_SEARCH_FILE, MULTIVARIATE_FILE, UNIVARIATE_FILE,
};
use racoons::pipeline::build_model;
use racoons::prelude::*;
use racoons::validation::get_feature_importance;
use racoons::visualization::plot_feature_importances;
use polars::prelude::*;

const N: usize = 60;

fn sample_df() -> DataFrame {
    let age: Vec<f64> = (0..N).map(|i| 30.0 + (i as f64) * 0.7 + ((i * 13) % 7) as f64).collect();
    let grade: Vec<i64> = (0..N).map(|i| ((i * 7) % 4) as i64 + 1).collect();
    let sex: Vec<&str> = (0..N).map(|i| if i % 3 == 0 { "f" } else { "m" }).collect();
    // relapse follows age with some noise, death follows grade
    let relapse: Vec<i64> = (0..N)
        .map(|i| if (i >= N / 2) ^ (i % 11 == 0) { 1 } else { 0 })
        .collect();
    let death: Vec<i64> = grade
        .iter()
        .enumerate()
        .map(|(i, &g)| i64::from(g >= 3) ^ i64::from(i % 9 == 0))
        .collect();

    df!(
        "age" => age,
        "grade" => grade,
        "sex" => sex,
        "relapse" => relapse,
        "death" => death,
    )
    .unwrap()
}

const FEATURES: [&str; 3] = ["age", "grade", "sex"];
const TARGETS: [&str; 2] = ["relapse", "death"];

fn string_column(df: &DataFrame, name: &str) -> Vec<String> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

fn count_column(df: &DataFrame, name: &str) -> Vec<u64> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .u64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

#[test]
fn test_multivariate_classification() {
    let dir = tempfile::tempdir().unwrap();
    let estimators = available_classifiers();
    let results = multivariate_classification(
        &sample_df(),
        &FEATURES,
        &TARGETS,
        None,
        None,
        &estimators,
        dir.path(),
    )
    .unwrap();

    assert_eq!(results.height(), 12, "one row per (target, estimator)");
    let saved = DataLoader::new().load_csv(dir.path().join(MULTIVARIATE_FILE)).unwrap();
    assert_eq!(saved.shape(), results.shape());

    let targets = string_column(&results, "target");
    assert_eq!(targets.iter().filter(|t| *t == "relapse").count(), 6);
    let expected: Vec<String> = estimators.iter().map(|e| e.to_string()).collect();
    assert_eq!(string_column(&results, "estimator")[..6], expected[..]);
    // "sex" is one-hot encoded but still counts as one input column
    assert!(count_column(&results, "n_features").iter().all(|&n| n == 3));

    let auc = results.column("auc_mean").unwrap().as_materialized_series().f64().unwrap().clone();
    for value in auc.into_iter().flatten() {
        assert!((0.0..=1.0).contains(&value));
    }
}

#[test]
fn test_multivariate_with_smote_and_lasso() {
    let dir = tempfile::tempdir().unwrap();
    let results = multivariate_classification(
        &sample_df(),
        &FEATURES,
        &TARGETS,
        Some("lasso"),
        Some("smote"),
        &["logistic_regression", "decision_tree"],
        dir.path(),
    )
    .unwrap();
    assert_eq!(results.height(), 4);
    assert_eq!(string_column(&results, "sample_method"), vec!["smote"; 4]);
    assert_eq!(string_column(&results, "feature_selection"), vec!["lasso"; 4]);
}

#[test]
fn test_univariate_classification() {
    let dir = tempfile::tempdir().unwrap();
    let results = univariate_classification(
        &sample_df(),
        &FEATURES,
        &TARGETS,
        Some("smote"),
        &available_classifiers(),
        dir.path(),
    )
    .unwrap();

    assert_eq!(results.height(), 36, "one row per (target, feature, estimator)");
    assert_eq!(string_column(&results, "sample_method"), vec!["smote"; 36]);
    assert!(count_column(&results, "n_features").iter().all(|&n| n == 1));
    assert!(dir.path().join(UNIVARIATE_FILE).exists());
    let features = string_column(&results, "feature");
    for name in FEATURES {
        assert_eq!(features.iter().filter(|f| *f == name).count(), 12);
    }
}

#[test]
fn test_grid_search_classification() {
    let dir = tempfile::tempdir().unwrap();
    let results = grid_search_multivariate_classification(
        &sample_df(),
        &FEATURES,
        &TARGETS,
        None,
        None,
        &["logistic_regression", "decision_tree"],
        dir.path(),
    )
    .unwrap();

    assert_eq!(results.height(), 2, "one row per target");
    assert!(dir.path().join(GRID_SEARCH_FILE).exists());
    for params in string_column(&results, "best_params") {
        let parsed: serde_json::Value = serde_json::from_str(&params).unwrap();
        assert!(parsed.as_object().unwrap().keys().all(|k| k.starts_with("estimator__")));
    }
}

#[test]
fn test_grid_search_full_pipeline_all_estimators() {
    let dir = tempfile::tempdir().unwrap();
    let estimators = available_classifiers();
    let results = grid_search_multivariate_classification(
        &sample_df(),
        &FEATURES,
        &TARGETS,
        Some("lasso"),
        Some("smote"),
        &estimators,
        dir.path(),
    )
    .unwrap();

    assert_eq!(results.shape(), (2, 14));
    assert_eq!(string_column(&results, "target"), vec!["relapse", "death"]);
    for winner in string_column(&results, "estimator") {
        assert!(estimators.contains(&winner.as_str()));
    }
    for params in string_column(&results, "best_params") {
        let parsed: serde_json::Value = serde_json::from_str(&params).unwrap();
        let keys: Vec<&String> = parsed.as_object().unwrap().keys().collect();
        assert!(keys.iter().any(|k| k.as_str() == "sampler__k_neighbors"));
        assert!(keys.iter().any(|k| k.starts_with("feature_selection__estimator__")));
        assert!(keys.iter().any(|k| k.starts_with("estimator__")));
    }

    let scores = results.column("search_score").unwrap().as_materialized_series().f64().unwrap().clone();
    for score in scores.into_iter() {
        let score = score.unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}

#[test]
fn test_param_grid_keys() {
    let dataset = features_and_targets_from_dataframe(&sample_df(), &FEATURES, &TARGETS).unwrap();
    for name in available_classifiers() {
        let plain = build_model(&dataset.scale_levels, None, None, name).unwrap();
        let grid = get_param_grid(&plain);
        assert!(!grid.is_empty(), "{} has no grid", name);
        assert!(grid.keys().all(|k| k.starts_with("estimator__")));

        let full = build_model(&dataset.scale_levels, Some("smote"), Some("lasso"), name).unwrap();
        let grid = get_param_grid(&full);
        assert!(grid.contains_key("sampler__k_neighbors"));
        assert!(grid.contains_key("feature_selection__estimator__C"));
        assert!(grid.contains_key("feature_selection__estimator__solver"));
    }
}

#[test]
fn test_feature_importance_after_cross_validation() {
    let dataset = features_and_targets_from_dataframe(&sample_df(), &FEATURES, &TARGETS).unwrap();
    let y = dataset.target("relapse").unwrap();
    let model = build_model(&dataset.scale_levels, None, None, "random_forest").unwrap();

    let cv = cross_validate_model(&model, &dataset.x, &y).unwrap();
    assert_eq!(cv.aucs.len(), 10);
    assert_eq!(cv.tprs.len(), 10);
    assert_eq!(cv.f1_scores.len(), 10);
    assert_eq!(cv.feature_importances.height(), 10);

    let fitted = racoons::validation::fit_fold(&model, &dataset.x, &y, &(0..N).collect::<Vec<_>>()).unwrap();
    let importance = get_feature_importance(&fitted).unwrap();
    let columns: Vec<String> = importance.get_column_names().iter().map(|c| c.to_string()).collect();
    assert_eq!(columns, fitted.feature_names_in().unwrap().to_vec());
    // nominal "sex" expands into one column per category
    assert!(columns.contains(&"sex_f".to_string()));
    assert!(columns.contains(&"sex_m".to_string()));

    let plot = plot_feature_importances(&cv.feature_importances).unwrap();
    assert!(plot.to_html().contains("sex_m"));
}

#[test]
fn test_configuration_errors() {
    let dir = tempfile::tempdir().unwrap();
    let df = sample_df();

    let unknown_estimator =
        multivariate_classification(&df, &FEATURES, &TARGETS, None, None, &["svm"], dir.path());
    assert!(matches!(unknown_estimator, Err(RacoonsError::ConfigError(_))));

    let disabled = multivariate_classification(&df, &FEATURES, &TARGETS, None, None, &["k_neighbors"], dir.path());
    assert!(matches!(disabled, Err(RacoonsError::ConfigError(_))));

    let sampler = univariate_classification(&df, &FEATURES, &TARGETS, Some("adasyn"), &["xgboost"], dir.path());
    assert!(matches!(sampler, Err(RacoonsError::ConfigError(_))));

    let selection = grid_search_multivariate_classification(
        &df,
        &FEATURES,
        &TARGETS,
        Some("rfe"),
        None,
        &["xgboost"],
        dir.path(),
    );
    assert!(matches!(selection, Err(RacoonsError::ConfigError(_))));

    let missing = multivariate_classification(&df, &["height"], &TARGETS, None, None, &["xgboost"], dir.path());
    assert!(matches!(missing, Err(RacoonsError::FeatureNotFound(_))));
}
