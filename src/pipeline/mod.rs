//! Model pipelines
//!
//! A [`Pipeline`] is an ordered list of named stages:
//! `preprocessor`, optional `sampler`, optional `feature_selection` and
//! `estimator`. Hyperparameters are addressed as `stage__param`.

pub mod builder;

pub use builder::{build_model, ModelBuilder, FEATURE_SELECTION_METHODS, SAMPLE_METHODS};

use crate::error::{RacoonsError, Result};
use crate::optimizer::search_space::{split_param_key, ParamGrid, ParamSet, ParamValue};
use crate::preprocessing::{ColumnPreprocessor, LassoSelector};
use crate::synthetic::{Sampler, SMOTE};
use crate::training::models::Estimator;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub const PREPROCESSOR: &str = "preprocessor";
pub const SAMPLER: &str = "sampler";
pub const FEATURE_SELECTION: &str = "feature_selection";
pub const ESTIMATOR: &str = "estimator";

/// A pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stage {
    Preprocessor(ColumnPreprocessor),
    /// Resampling, applied while fitting only
    Sampler(SMOTE),
    FeatureSelection(LassoSelector),
    Estimator(Estimator),
}

impl Stage {
    /// Grid over this stage's own parameters, unprefixed
    pub fn param_grid(&self) -> ParamGrid {
        match self {
            Stage::Preprocessor(_) => ParamGrid::new(),
            Stage::Sampler(_) => SMOTE::param_grid(),
            Stage::FeatureSelection(_) => LassoSelector::param_grid(),
            Stage::Estimator(e) => e.param_grid(),
        }
    }

    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match self {
            Stage::Preprocessor(_) => Err(RacoonsError::invalid_parameter(
                name,
                value,
                "the preprocessor has no tunable parameters",
            )),
            Stage::Sampler(s) => s.set_param(name, value),
            Stage::FeatureSelection(f) => f.set_param(name, value),
            Stage::Estimator(e) => e.set_param(name, value),
        }
    }
}

/// A named stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub stage: Stage,
}

impl Step {
    pub fn new(name: &str, stage: Stage) -> Self {
        Self {
            name: name.to_string(),
            stage,
        }
    }
}

/// Preprocessing, resampling, selection and estimation, fit as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<Step>,
    feature_names_in: Option<Vec<String>>,
}

impl Pipeline {
    /// Assemble a pipeline; the first step must be the preprocessor and the
    /// last the estimator
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        let first_ok = matches!(steps.first(), Some(Step { stage: Stage::Preprocessor(_), .. }));
        let last_ok = matches!(steps.last(), Some(Step { stage: Stage::Estimator(_), .. }));
        if !first_ok || !last_ok {
            return Err(RacoonsError::ConfigError(
                "A pipeline starts with a preprocessor and ends with an estimator".to_string(),
            ));
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.name == step.name) {
                return Err(RacoonsError::ConfigError(format!(
                    "Duplicate pipeline step '{}'",
                    step.name
                )));
            }
        }
        Ok(Self {
            steps,
            feature_names_in: None,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn step(&self, name: &str) -> Option<&Stage> {
        self.steps.iter().find(|s| s.name == name).map(|s| &s.stage)
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.step(name).is_some()
    }

    pub fn estimator(&self) -> Option<&Estimator> {
        self.steps.iter().rev().find_map(|s| match &s.stage {
            Stage::Estimator(e) => Some(e),
            _ => None,
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.feature_names_in.is_some()
    }

    /// Names of the columns the estimator was fit on, after preprocessing
    /// and feature selection
    pub fn feature_names_in(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    /// Union of the stage grids, keyed `stage__param`
    pub fn param_grid(&self) -> ParamGrid {
        let mut grid = ParamGrid::new();
        for step in &self.steps {
            grid.extend_prefixed(&step.name, step.stage.param_grid());
        }
        grid
    }

    /// Route a `stage__param` key to its stage
    pub fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        let (stage_name, param) = split_param_key(key).ok_or_else(|| {
            RacoonsError::invalid_parameter(key, value, "expected a `stage__param` key")
        })?;
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.name == stage_name)
            .ok_or_else(|| {
                RacoonsError::invalid_parameter(key, value, format!("no stage named '{}'", stage_name))
            })?;
        step.stage.set_param(param, value)
    }

    pub fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (key, value) in params {
            self.set_param(key, value)?;
        }
        Ok(())
    }

    /// Fit every stage in order on `x` (raw features) and 0/1 labels `y`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut x_t = x.clone();
        let mut y_t = y.clone();
        let mut names: Vec<String> = Vec::new();
        self.feature_names_in = None;

        for step in &mut self.steps {
            match &mut step.stage {
                Stage::Preprocessor(p) => {
                    x_t = p.fit_transform(&x_t)?;
                    names = p.feature_names_out().to_vec();
                }
                Stage::Sampler(s) => {
                    let resampled = s.fit_resample(&x_t, &y_t)?;
                    x_t = resampled.x;
                    y_t = resampled.y;
                }
                Stage::FeatureSelection(f) => {
                    x_t = f.fit_transform(&x_t, &y_t)?;
                    names = f.selected_names(&names)?;
                }
                Stage::Estimator(e) => e.fit(&x_t, &y_t)?,
            }
        }

        self.feature_names_in = Some(names);
        Ok(self)
    }

    /// Run the fitted non-estimator stages; samplers are skipped
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut x_t = x.clone();
        for step in &self.steps {
            x_t = match &step.stage {
                Stage::Preprocessor(p) => p.transform(&x_t)?,
                Stage::FeatureSelection(f) => f.transform(&x_t)?,
                Stage::Sampler(_) | Stage::Estimator(_) => continue,
            };
        }
        Ok(x_t)
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(RacoonsError::ModelNotFitted("pipeline".to_string()));
        }
        let estimator = self
            .estimator()
            .ok_or_else(|| RacoonsError::ConfigError("pipeline has no estimator".to_string()))?;
        estimator.predict_proba(&self.transform(x)?)
    }

    /// Class labels at threshold 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Estimator importances paired with `feature_names_in`
    pub fn feature_importances(&self) -> Result<Vec<(String, f64)>> {
        let names = self
            .feature_names_in
            .as_ref()
            .ok_or_else(|| RacoonsError::ModelNotFitted("pipeline".to_string()))?;
        let importances = self
            .estimator()
            .and_then(|e| e.feature_importances())
            .ok_or_else(|| RacoonsError::ModelNotFitted("estimator".to_string()))?;
        if importances.len() != names.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("{} importances", names.len()),
                actual: format!("{} importances", importances.len()),
            });
        }
        Ok(names.iter().cloned().zip(importances.iter().copied()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{ScaleLevel, ScaleLevels};
    use ndarray::Axis;

    fn levels() -> ScaleLevels {
        ScaleLevels::from_pairs(&[
            ("age", ScaleLevel::Continuous),
            ("sex", ScaleLevel::Nominal),
            ("noise", ScaleLevel::Continuous),
        ])
    }

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 2) as f64,
            _ => ((i * 7) % 3) as f64 * 0.01,
        });
        let y = Array1::from_iter((0..30).map(|i| if i >= 18 { 1.0 } else { 0.0 }));
        (x, y)
    }

    #[test]
    fn test_fit_records_feature_names() {
        let (x, y) = data();
        let mut model = build_model(&levels(), None, None, "decision_tree").unwrap();
        assert!(model.feature_importances().is_err());
        model.fit(&x, &y).unwrap();

        assert_eq!(
            model.feature_names_in().unwrap(),
            &["age", "sex_0", "sex_1", "noise"]
        );
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 30);
        assert!(proba[29] > proba[0]);
    }

    #[test]
    fn test_sampler_only_runs_while_fitting() {
        let (x, y) = data();
        let mut model = build_model(&levels(), Some("smote"), Some("lasso"), "logistic_regression").unwrap();
        assert_eq!(
            model.step_names(),
            vec!["preprocessor", "sampler", "feature_selection", "estimator"]
        );
        model.fit(&x, &y).unwrap();

        let test = x.select(Axis(0), &[0, 1, 2]);
        assert_eq!(model.predict(&test).unwrap().len(), 3);
        let names = model.feature_names_in().unwrap().to_vec();
        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(), names);
    }

    #[test]
    fn test_set_param_routing() {
        let mut model = build_model(&levels(), Some("smote"), Some("lasso"), "random_forest").unwrap();
        model.set_param("estimator__n_estimators", &ParamValue::Int(10)).unwrap();
        model.set_param("sampler__k_neighbors", &ParamValue::Int(3)).unwrap();
        model.set_param("feature_selection__estimator__C", &ParamValue::Float(0.1)).unwrap();

        assert!(model.set_param("scaler__with_mean", &ParamValue::Int(1)).is_err());
        assert!(model.set_param("estimator", &ParamValue::Int(1)).is_err());
        assert!(model.set_param("preprocessor__x", &ParamValue::Int(1)).is_err());

        match model.step(SAMPLER) {
            Some(Stage::Sampler(s)) => assert_eq!(s.config.k_neighbors, 3),
            other => panic!("unexpected sampler stage {:?}", other),
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = data();
        let model = build_model(&levels(), None, None, "xgboost").unwrap();
        assert!(matches!(model.predict_proba(&x), Err(RacoonsError::ModelNotFitted(_))));
    }

    #[test]
    fn test_pipeline_shape_is_checked() {
        assert!(Pipeline::new(vec![]).is_err());
        let pre = Step::new(PREPROCESSOR, Stage::Preprocessor(ColumnPreprocessor::new(levels())));
        assert!(Pipeline::new(vec![pre]).is_err());
    }
}
