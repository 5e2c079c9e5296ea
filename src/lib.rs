//! Racoons - cross-validated binary classification on tabular data
//!
//! This crate evaluates classification pipelines against one or more binary
//! targets:
//! - Scale-level aware preprocessing (one-hot, min-max, standard)
//! - Optional SMOTE oversampling and lasso feature selection
//! - Stratified 10-fold cross-validation with ROC/AUC and F1 summaries
//! - Multivariate, univariate and grid-search drivers that write CSV tables
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Column transforms and feature selection
//! - [`synthetic`] - Minority oversampling (SMOTE)
//! - [`training`] - Binary classifiers
//! - [`pipeline`] - Ordered stages and parameter routing
//! - [`validation`] - Cross-validation and metrics
//!
//! ## Drivers
//! - [`classification`] - Multivariate, univariate and grid-search runs
//! - [`visualization`] - Feature importance and ROC plots
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod optimizer;
pub mod pipeline;
pub mod validation;

// Drivers
pub mod classification;
pub mod visualization;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{RacoonsError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{RacoonsError, Result};

    // Preprocessing
    pub use crate::preprocessing::{
        ColumnPreprocessor, FeatureScale, LassoSelector, OneHotEncoder, ScaleLevel, ScaleLevels, Scaler,
        ScalerType,
    };

    // Oversampling
    pub use crate::synthetic::{Sampler, SmoteConfig, SMOTE};

    // Training
    pub use crate::training::{available_classifiers, build_estimator, Estimator};

    // Pipelines
    pub use crate::optimizer::{ParamGrid, ParamSet, ParamValue};
    pub use crate::pipeline::{build_model, ModelBuilder, Pipeline, Stage, Step};

    // Validation
    pub use crate::validation::{
        cross_validate_model, cross_validate_with_config, get_feature_importance, get_param_grid,
        CrossValidation, CrossValidationConfig,
    };

    // Drivers
    pub use crate::classification::{
        grid_search_multivariate_classification, multivariate_classification, univariate_classification,
        ClassificationConfig, ClassificationResult,
    };

    // Data loading
    pub use crate::utils::{features_and_targets_from_dataframe, DataLoader, DataSaver, Dataset};
}
