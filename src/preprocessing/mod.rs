//! Data preprocessing module
//!
//! Scale-level aware preprocessing of feature matrices:
//! - Nominal features are one-hot encoded
//! - Ordinal features are min-max scaled
//! - Continuous features are standard scaled
//!
//! plus the lasso feature selector used as an optional pipeline stage.

mod encoder;
mod pipeline;
mod scaler;
pub mod feature_selection;

pub use encoder::OneHotEncoder;
pub use feature_selection::LassoSelector;
pub use pipeline::{ColumnPreprocessor, ColumnTransform};
pub use scaler::{Scaler, ScalerParams, ScalerType};

use crate::error::{RacoonsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement scale of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleLevel {
    /// Unordered categories
    Nominal,
    /// Ordered, discrete values
    Ordinal,
    /// Real-valued measurements
    Continuous,
}

impl ScaleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleLevel::Nominal => "nominal",
            ScaleLevel::Ordinal => "ordinal",
            ScaleLevel::Continuous => "continuous",
        }
    }

    /// Scaler used for this level; nominal features are encoded instead
    pub fn scaler_type(&self) -> Option<ScalerType> {
        match self {
            ScaleLevel::Nominal => None,
            ScaleLevel::Ordinal => Some(ScalerType::MinMax),
            ScaleLevel::Continuous => Some(ScalerType::Standard),
        }
    }
}

impl fmt::Display for ScaleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale annotation of one feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScale {
    pub name: String,
    pub level: ScaleLevel,
    /// Original labels of a label-encoded column (code `i` is `categories[i]`);
    /// empty for numeric columns
    pub categories: Vec<String>,
}

impl FeatureScale {
    pub fn new(name: impl Into<String>, level: ScaleLevel) -> Self {
        Self {
            name: name.into(),
            level,
            categories: Vec::new(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }
}

/// Ordered scale annotations, one per feature matrix column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleLevels {
    features: Vec<FeatureScale>,
}

impl ScaleLevels {
    pub fn new(features: Vec<FeatureScale>) -> Self {
        Self { features }
    }

    /// Build from `(name, level)` pairs
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, ScaleLevel)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(name, level)| FeatureScale::new(name.as_ref(), *level))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureScale> {
        self.features.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureScale> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Annotations of the named features, in the given order
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<ScaleLevels> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .cloned()
                    .ok_or_else(|| RacoonsError::FeatureNotFound(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(ScaleLevels::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_per_level() {
        assert_eq!(ScaleLevel::Nominal.scaler_type(), None);
        assert_eq!(ScaleLevel::Ordinal.scaler_type(), Some(ScalerType::MinMax));
        assert_eq!(ScaleLevel::Continuous.scaler_type(), Some(ScalerType::Standard));
    }

    #[test]
    fn test_subset_keeps_requested_order() {
        let levels = ScaleLevels::from_pairs(&[
            ("age", ScaleLevel::Continuous),
            ("sex", ScaleLevel::Nominal),
            ("grade", ScaleLevel::Ordinal),
        ]);
        let sub = levels.subset(&["grade", "age"]).unwrap();
        assert_eq!(sub.names(), vec!["grade", "age"]);
        assert!(matches!(
            levels.subset(&["height"]),
            Err(RacoonsError::FeatureNotFound(_))
        ));
    }
}
