//! Feature scaling implementations

use crate::error::{RacoonsError, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean or min
    pub center: f64,
    /// std or range, never zero
    pub scale: f64,
}

/// Single-column scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Option<ScalerParams>,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: None,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn params(&self) -> Option<ScalerParams> {
        self.params
    }

    /// Fit the scaler to one column
    pub fn fit(&mut self, column: ArrayView1<f64>) -> Result<&mut Self> {
        if column.is_empty() {
            return Err(RacoonsError::DataError(
                "Cannot fit a scaler on an empty column".to_string(),
            ));
        }
        self.params = Some(self.compute_params(column));
        Ok(self)
    }

    fn compute_params(&self, column: ArrayView1<f64>) -> ScalerParams {
        let (center, scale) = match self.scaler_type {
            ScalerType::Standard => {
                let mean = column.mean().unwrap_or(0.0);
                // population std, as sklearn's StandardScaler
                (mean, column.std(0.0))
            }
            ScalerType::MinMax => {
                let min = column.iter().copied().fold(f64::INFINITY, f64::min);
                let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
        };

        // constant columns map to zero instead of dividing by zero
        let scale = if scale.abs() < 1e-12 { 1.0 } else { scale };
        ScalerParams { center, scale }
    }

    /// Transform one column with the fitted parameters
    pub fn transform(&self, column: ArrayView1<f64>) -> Result<Array1<f64>> {
        let params = self
            .params
            .ok_or_else(|| RacoonsError::ModelNotFitted("scaler".to_string()))?;
        Ok(column.mapv(|v| (v - params.center) / params.scale))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, column: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.fit(column)?;
        self.transform(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let col = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut scaler = Scaler::new(ScalerType::Standard);
        let scaled = scaler.fit_transform(col.view()).unwrap();

        assert!(scaled.mean().unwrap().abs() < 1e-10);
        assert!((scaled.std(0.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_minmax_scaler() {
        let col = array![2.0, 4.0, 6.0, 10.0];
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let scaled = scaler.fit_transform(col.view()).unwrap();

        assert_eq!(scaled[0], 0.0);
        assert_eq!(scaled[3], 1.0);
        assert!((scaled[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column() {
        let col = array![3.0, 3.0, 3.0];
        let mut scaler = Scaler::new(ScalerType::Standard);
        let scaled = scaler.fit_transform(col.view()).unwrap();
        assert!(scaled.iter().all(|v| *v == 0.0));
        assert_eq!(scaler.params().unwrap().scale, 1.0);
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = Scaler::new(ScalerType::MinMax);
        assert!(scaler.transform(array![1.0].view()).is_err());
    }
}
