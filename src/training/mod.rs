//! Model training module
//!
//! Binary classifiers evaluated by the classification drivers:
//! - Logistic regression (L1 or L2 penalty)
//! - Decision trees and Random Forests
//! - AdaBoost
//! - Gradient boosting and XGBoost

pub mod cross_validation;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod adaboost;
pub mod xgboost;
pub mod models;

pub use cross_validation::{CrossValidator, CVSplit};
pub use linear_models::{LogisticRegression, Penalty, Solver};
pub use decision_tree::{DecisionTree, TreeNode, Criterion};
pub use random_forest::{RandomForest, MaxFeatures};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use adaboost::AdaBoostClassifier;
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
pub use models::{available_classifiers, build_estimator, Estimator, CLASSIFIERS};
