//! Pipeline construction from configuration names

use super::{Pipeline, Stage, Step, ESTIMATOR, FEATURE_SELECTION, PREPROCESSOR, SAMPLER};
use crate::error::{RacoonsError, Result};
use crate::preprocessing::{ColumnPreprocessor, LassoSelector, ScaleLevels};
use crate::synthetic::SMOTE;
use crate::training::models::build_estimator;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Accepted `sample_method` names
pub const SAMPLE_METHODS: &[&str] = &["smote"];

/// Accepted `feature_selection_method` names
pub const FEATURE_SELECTION_METHODS: &[&str] = &["lasso"];

pub const DEFAULT_RANDOM_STATE: u64 = 42;

pub fn validate_sample_method(method: Option<&str>) -> Result<()> {
    match method {
        None => Ok(()),
        Some(m) if SAMPLE_METHODS.contains(&m) => Ok(()),
        Some(m) => Err(RacoonsError::ConfigError(format!(
            "Unknown sample method '{}', expected one of: {}",
            m,
            SAMPLE_METHODS.join(", ")
        ))),
    }
}

pub fn validate_feature_selection_method(method: Option<&str>) -> Result<()> {
    match method {
        None => Ok(()),
        Some(m) if FEATURE_SELECTION_METHODS.contains(&m) => Ok(()),
        Some(m) => Err(RacoonsError::ConfigError(format!(
            "Unknown feature selection method '{}', expected one of: {}",
            m,
            FEATURE_SELECTION_METHODS.join(", ")
        ))),
    }
}

/// Builds unfit pipelines with a fixed seed for every random stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelBuilder {
    random_state: u64,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            random_state: DEFAULT_RANDOM_STATE,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Assemble `preprocessor -> [sampler] -> [feature_selection] -> estimator`.
    /// Every name is checked here; nothing is deferred to fit time.
    pub fn build(
        &self,
        scale_levels: &ScaleLevels,
        sample_method: Option<&str>,
        feature_selection_method: Option<&str>,
        estimator_name: &str,
    ) -> Result<Pipeline> {
        validate_sample_method(sample_method)?;
        validate_feature_selection_method(feature_selection_method)?;
        let mut estimator = build_estimator(estimator_name)?;
        estimator.set_random_state(self.random_state);

        let mut steps = vec![Step::new(
            PREPROCESSOR,
            Stage::Preprocessor(ColumnPreprocessor::new(scale_levels.clone())),
        )];
        if let Some(stage) = self.sampler_stage(sample_method)? {
            steps.push(Step::new(SAMPLER, stage));
        }
        if let Some(stage) = self.feature_selection_stage(feature_selection_method)? {
            steps.push(Step::new(FEATURE_SELECTION, stage));
        }
        steps.push(Step::new(ESTIMATOR, Stage::Estimator(estimator)));

        debug!(
            estimator = estimator_name,
            sample_method = sample_method.unwrap_or("none"),
            feature_selection = feature_selection_method.unwrap_or("none"),
            "Built pipeline"
        );
        Pipeline::new(steps)
    }

    fn sampler_stage(&self, method: Option<&str>) -> Result<Option<Stage>> {
        match method {
            None => Ok(None),
            Some("smote") => Ok(Some(Stage::Sampler(SMOTE::new().with_seed(self.random_state)))),
            Some(other) => Err(RacoonsError::ConfigError(format!(
                "No sampler stage for sample method '{}'",
                other
            ))),
        }
    }

    fn feature_selection_stage(&self, method: Option<&str>) -> Result<Option<Stage>> {
        match method {
            None => Ok(None),
            Some("lasso") => Ok(Some(Stage::FeatureSelection(LassoSelector::new()))),
            Some(other) => Err(RacoonsError::ConfigError(format!(
                "No feature selection stage for method '{}'",
                other
            ))),
        }
    }
}

/// Build an unfit pipeline with the default seed
pub fn build_model(
    scale_levels: &ScaleLevels,
    sample_method: Option<&str>,
    feature_selection_method: Option<&str>,
    estimator_name: &str,
) -> Result<Pipeline> {
    ModelBuilder::new().build(scale_levels, sample_method, feature_selection_method, estimator_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::ScaleLevel;

    fn levels() -> ScaleLevels {
        ScaleLevels::from_pairs(&[("a", ScaleLevel::Continuous)])
    }

    #[test]
    fn test_optional_stages() {
        let plain = build_model(&levels(), None, None, "ada_boost").unwrap();
        assert_eq!(plain.step_names(), vec!["preprocessor", "estimator"]);

        let full = build_model(&levels(), Some("smote"), Some("lasso"), "ada_boost").unwrap();
        assert!(full.has_step("sampler"));
        assert!(full.has_step("feature_selection"));
        assert_eq!(full.estimator().unwrap().name(), "ada_boost");
    }

    #[test]
    fn test_unknown_names_fail_at_build_time() {
        for result in [
            build_model(&levels(), None, None, "svm"),
            build_model(&levels(), Some("adasyn"), None, "xgboost"),
            build_model(&levels(), None, Some("rfe"), "xgboost"),
            build_model(&levels(), None, None, "k_neighbors"),
        ] {
            assert!(matches!(result, Err(RacoonsError::ConfigError(_))));
        }
    }

    #[test]
    fn test_every_listed_method_has_a_stage() {
        let builder = ModelBuilder::new();
        for &method in SAMPLE_METHODS {
            assert!(matches!(builder.sampler_stage(Some(method)), Ok(Some(Stage::Sampler(_)))));
        }
        for &method in FEATURE_SELECTION_METHODS {
            assert!(matches!(
                builder.feature_selection_stage(Some(method)),
                Ok(Some(Stage::FeatureSelection(_)))
            ));
        }
        assert!(matches!(builder.sampler_stage(None), Ok(None)));
        assert!(matches!(
            builder.sampler_stage(Some("adasyn")),
            Err(RacoonsError::ConfigError(_))
        ));
        assert!(matches!(
            builder.feature_selection_stage(Some("rfe")),
            Err(RacoonsError::ConfigError(_))
        ));
    }

    #[test]
    fn test_random_state_reaches_stages() {
        let model = ModelBuilder::new()
            .with_random_state(7)
            .build(&levels(), Some("smote"), None, "random_forest")
            .unwrap();
        match model.step(SAMPLER) {
            Some(Stage::Sampler(s)) => assert_eq!(s.config.random_state, Some(7)),
            other => panic!("unexpected sampler stage {:?}", other),
        }
    }
}
