//! One-hot encoding of nominal feature columns

use crate::error::{RacoonsError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// One-hot encoder for a single numerically coded column.
///
/// Categories are the distinct codes seen during fit, in ascending order.
/// A code not seen during fit encodes to an all-zero row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<f64>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[f64] {
        &self.categories
    }

    pub fn n_outputs(&self) -> usize {
        self.categories.len()
    }

    pub fn fit(&mut self, column: ArrayView1<f64>) -> Result<&mut Self> {
        if column.is_empty() {
            return Err(RacoonsError::DataError(
                "Cannot fit an encoder on an empty column".to_string(),
            ));
        }
        let mut categories: Vec<f64> = column.to_vec();
        categories.sort_by(f64::total_cmp);
        categories.dedup();
        self.categories = categories;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, column: ArrayView1<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RacoonsError::ModelNotFitted("one-hot encoder".to_string()));
        }
        let mut out = Array2::zeros((column.len(), self.categories.len()));
        for (row, value) in column.iter().enumerate() {
            if let Ok(pos) = self.categories.binary_search_by(|c| c.total_cmp(value)) {
                out[[row, pos]] = 1.0;
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, column: ArrayView1<f64>) -> Result<Array2<f64>> {
        self.fit(column)?;
        self.transform(column)
    }

    /// Output column names `{name}_{category}`; `labels` maps integral codes
    /// back to the original category strings when the column was label-encoded
    pub fn feature_names(&self, name: &str, labels: &[String]) -> Vec<String> {
        self.categories
            .iter()
            .map(|&code| {
                let label = if code.fract() == 0.0 && code >= 0.0 {
                    labels
                        .get(code as usize)
                        .cloned()
                        .unwrap_or_else(|| format!("{}", code as i64))
                } else {
                    format!("{}", code)
                };
                format!("{}_{}", name, label)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_onehot_encoding() {
        let col = array![2.0, 0.0, 2.0, 1.0];
        let mut encoder = OneHotEncoder::new();
        let encoded = encoder.fit_transform(col.view()).unwrap();

        assert_eq!(encoded.dim(), (4, 3));
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(encoded.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(encoded.sum(), 4.0);
    }

    #[test]
    fn test_unknown_category_is_zero_row() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(array![0.0, 1.0].view()).unwrap();
        let encoded = encoder.transform(array![5.0].view()).unwrap();
        assert_eq!(encoded.row(0).sum(), 0.0);
    }

    #[test]
    fn test_feature_names() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(array![1.0, 0.0].view()).unwrap();
        let labels = vec!["female".to_string(), "male".to_string()];
        assert_eq!(encoder.feature_names("sex", &labels), vec!["sex_female", "sex_male"]);
        assert_eq!(encoder.feature_names("smoker", &[]), vec!["smoker_0", "smoker_1"]);
    }
}
