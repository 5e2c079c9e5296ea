//! Column-wise preprocessing driven by scale levels

use super::{OneHotEncoder, ScaleLevel, ScaleLevels, Scaler};
use crate::error::{RacoonsError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted transformation of one input column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnTransform {
    Scale(Scaler),
    OneHot(OneHotEncoder),
}

impl ColumnTransform {
    fn n_outputs(&self) -> usize {
        match self {
            ColumnTransform::Scale(_) => 1,
            ColumnTransform::OneHot(encoder) => encoder.n_outputs(),
        }
    }
}

/// The `preprocessor` pipeline stage.
///
/// Input columns are matched to `scale_levels` by position. Output columns
/// keep the input order, with each nominal column expanded in place into its
/// one-hot indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPreprocessor {
    scale_levels: ScaleLevels,
    transforms: Vec<ColumnTransform>,
    feature_names_out: Vec<String>,
    is_fitted: bool,
}

impl ColumnPreprocessor {
    pub fn new(scale_levels: ScaleLevels) -> Self {
        Self {
            scale_levels,
            transforms: Vec::new(),
            feature_names_out: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scale_levels(&self) -> &ScaleLevels {
        &self.scale_levels
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Names of the transformed columns; empty before fit
    pub fn feature_names_out(&self) -> &[String] {
        &self.feature_names_out
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.scale_levels.len() {
            return Err(RacoonsError::ShapeError {
                expected: format!("{} columns", self.scale_levels.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        self.check_width(x)?;

        let mut transforms = Vec::with_capacity(x.ncols());
        let mut names = Vec::new();
        for (feature, column) in self.scale_levels.iter().zip(x.axis_iter(Axis(1))) {
            let transform = match feature.level.scaler_type() {
                Some(scaler_type) => {
                    let mut scaler = Scaler::new(scaler_type);
                    scaler.fit(column)?;
                    names.push(feature.name.clone());
                    ColumnTransform::Scale(scaler)
                }
                None => {
                    let mut encoder = OneHotEncoder::new();
                    encoder.fit(column)?;
                    names.extend(encoder.feature_names(&feature.name, &feature.categories));
                    ColumnTransform::OneHot(encoder)
                }
            };
            transforms.push(transform);
        }

        debug!(
            n_inputs = x.ncols(),
            n_outputs = names.len(),
            nominal = self
                .scale_levels
                .iter()
                .filter(|f| f.level == ScaleLevel::Nominal)
                .count(),
            "Fitted column preprocessor"
        );

        self.transforms = transforms;
        self.feature_names_out = names;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RacoonsError::ModelNotFitted("preprocessor".to_string()));
        }
        self.check_width(x)?;

        let mut out = Array2::zeros((x.nrows(), self.feature_names_out.len()));
        let mut offset = 0;
        for (transform, column) in self.transforms.iter().zip(x.axis_iter(Axis(1))) {
            let width = transform.n_outputs();
            match transform {
                ColumnTransform::Scale(scaler) => {
                    out.column_mut(offset).assign(&scaler.transform(column)?);
                }
                ColumnTransform::OneHot(encoder) => {
                    out.slice_mut(ndarray::s![.., offset..offset + width])
                        .assign(&encoder.transform(column)?);
                }
            }
            offset += width;
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
