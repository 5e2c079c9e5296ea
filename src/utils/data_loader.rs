//! Data loading utilities
//!
//! CSV reading/writing and the conversion of a polars `DataFrame` into the
//! numeric feature/target matrices used by the modelling code.

use crate::error::{RacoonsError, Result};
use crate::preprocessing::{FeatureScale, ScaleLevel, ScaleLevels};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Data loader for CSV files
#[derive(Debug, Clone)]
pub struct DataLoader {
    delimiter: u8,
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            infer_schema_length: Some(100),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| RacoonsError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        info!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Detect file format from extension and load
    pub fn load_auto<P: AsRef<Path>>(&self, path: P) -> Result<DataFrame> {
        let path = path.as_ref();
        let is_tsv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("tsv"))
            .unwrap_or(false);
        if is_tsv {
            self.clone().with_delimiter(b'\t').load_csv(path)
        } else {
            self.load_csv(path)
        }
    }
}

/// Data saver
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row
    pub fn save_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

/// Numeric view of a dataset: features X, binary targets y and the scale
/// level of every feature column
#[derive(Debug, Clone)]
pub struct Dataset {
    /// samples x features
    pub x: Array2<f64>,
    /// samples x targets, values 0/1
    pub y: Array2<f64>,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
    pub scale_levels: ScaleLevels,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    /// Labels of one target column
    pub fn target(&self, name: &str) -> Result<Array1<f64>> {
        let idx = self
            .target_names
            .iter()
            .position(|t| t == name)
            .ok_or_else(|| RacoonsError::FeatureNotFound(name.to_string()))?;
        Ok(self.y.column(idx).to_owned())
    }

    /// Columns of X for the named features, with their scale levels
    pub fn feature_subset<S: AsRef<str>>(&self, names: &[S]) -> Result<(Array2<f64>, ScaleLevels)> {
        let positions = names
            .iter()
            .map(|name| {
                self.scale_levels
                    .position(name.as_ref())
                    .ok_or_else(|| RacoonsError::FeatureNotFound(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let x = self.x.select(ndarray::Axis(1), &positions);
        Ok((x, self.scale_levels.subset(names)?))
    }
}

/// Convert the named columns of `df` into a [`Dataset`].
///
/// Rows with a null in any of the named columns are dropped. Scale levels are
/// inferred from the column dtypes: strings and booleans are nominal, integer
/// columns are nominal when they hold exactly two distinct values and ordinal
/// otherwise, floats are continuous. Each target must hold exactly two
/// distinct values; the lower one maps to 0.
pub fn features_and_targets_from_dataframe<S: AsRef<str>>(
    df: &DataFrame,
    feature_cols: &[S],
    target_cols: &[S],
) -> Result<Dataset> {
    if feature_cols.is_empty() {
        return Err(RacoonsError::ConfigError("At least one feature column is required".to_string()));
    }
    if target_cols.is_empty() {
        return Err(RacoonsError::ConfigError("At least one target column is required".to_string()));
    }

    let mut selected: Vec<String> = Vec::with_capacity(feature_cols.len() + target_cols.len());
    for name in feature_cols.iter().chain(target_cols.iter()) {
        let name = name.as_ref();
        if df.column(name).is_err() {
            return Err(RacoonsError::FeatureNotFound(name.to_string()));
        }
        if !selected.iter().any(|s| s == name) {
            selected.push(name.to_string());
        }
    }

    let clean = df.select(selected.iter().map(|s| s.as_str()))?.drop_nulls::<String>(None)?;
    let dropped = df.height() - clean.height();
    if dropped > 0 {
        info!(dropped, remaining = clean.height(), "Dropped rows with missing values");
    }
    if clean.height() == 0 {
        return Err(RacoonsError::DataError("No complete rows left after dropping nulls".to_string()));
    }

    let n = clean.height();
    let mut x = Array2::zeros((n, feature_cols.len()));
    let mut scales = Vec::with_capacity(feature_cols.len());
    for (j, name) in feature_cols.iter().enumerate() {
        let series = clean.column(name.as_ref())?.as_materialized_series();
        let (values, scale) = encode_feature(series)?;
        debug!(feature = name.as_ref(), level = %scale.level, "Inferred scale level");
        x.column_mut(j).assign(&Array1::from_vec(values));
        scales.push(scale);
    }

    let mut y = Array2::zeros((n, target_cols.len()));
    for (j, name) in target_cols.iter().enumerate() {
        let series = clean.column(name.as_ref())?.as_materialized_series();
        y.column_mut(j).assign(&Array1::from_vec(encode_target(series)?));
    }

    Ok(Dataset {
        x,
        y,
        feature_names: feature_cols.iter().map(|s| s.as_ref().to_string()).collect(),
        target_names: target_cols.iter().map(|s| s.as_ref().to_string()).collect(),
        scale_levels: ScaleLevels::new(scales),
    })
}

fn float_values(series: &Series) -> Result<Vec<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Label-encode strings with codes in sorted category order
fn label_encode(series: &Series) -> Result<(Vec<f64>, Vec<String>)> {
    let ca = series.str()?;
    let mut categories: Vec<String> = ca.into_iter().flatten().map(|s| s.to_string()).collect();
    categories.sort();
    categories.dedup();

    let codes = ca
        .into_iter()
        .map(|v| {
            v.and_then(|s| categories.binary_search_by(|c| c.as_str().cmp(s)).ok())
                .map(|code| code as f64)
                .unwrap_or(f64::NAN)
        })
        .collect();
    Ok((codes, categories))
}

fn n_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

fn encode_feature(series: &Series) -> Result<(Vec<f64>, FeatureScale)> {
    let name = series.name().to_string();
    let dtype = series.dtype();

    if matches!(dtype, DataType::String) {
        let (codes, categories) = label_encode(series)?;
        return Ok((codes, FeatureScale::new(name, ScaleLevel::Nominal).with_categories(categories)));
    }
    if matches!(dtype, DataType::Boolean) {
        let values = float_values(series)?;
        let scale = FeatureScale::new(name, ScaleLevel::Nominal)
            .with_categories(vec!["false".to_string(), "true".to_string()]);
        return Ok((values, scale));
    }
    if dtype.is_integer() {
        let values = float_values(series)?;
        let level = if n_distinct(&values) == 2 {
            ScaleLevel::Nominal
        } else {
            ScaleLevel::Ordinal
        };
        return Ok((values, FeatureScale::new(name, level)));
    }
    if dtype.is_float() {
        let values = float_values(series)?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RacoonsError::DataError(format!(
                "Feature '{}' contains non-finite values",
                name
            )));
        }
        return Ok((values, FeatureScale::new(name, ScaleLevel::Continuous)));
    }

    Err(RacoonsError::DataError(format!(
        "Feature '{}' has unsupported dtype {}",
        name, dtype
    )))
}

fn encode_target(series: &Series) -> Result<Vec<f64>> {
    let name = series.name().to_string();
    let values = match series.dtype() {
        DataType::String => label_encode(series)?.0,
        dtype if dtype.is_integer() || dtype.is_float() || matches!(dtype, DataType::Boolean) => {
            float_values(series)?
        }
        dtype => {
            return Err(RacoonsError::DataError(format!(
                "Target '{}' has unsupported dtype {}",
                name, dtype
            )))
        }
    };

    let mut classes = values.clone();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    if classes.len() != 2 {
        return Err(RacoonsError::DataError(format!(
            "Target '{}' must be binary, found {} distinct values",
            name,
            classes.len()
        )));
    }
    let positive = classes[1];
    Ok(values.into_iter().map(|v| if v == positive { 1.0 } else { 0.0 }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "age" => &[34.5, 51.0, 47.2, 29.9, 62.1, 40.0],
            "stage" => &[1i64, 3, 2, 4, 2, 1],
            "smoker" => &[0i64, 1, 1, 0, 0, 1],
            "sex" => &["m", "f", "f", "m", "f", "m"],
            "death" => &[0i64, 1, 1, 0, 1, 0],
            "relapse" => &["no", "yes", "no", "no", "yes", "yes"]
        )
        .unwrap()
    }

    #[test]
    fn test_scale_level_inference() {
        let df = sample_df();
        let data = features_and_targets_from_dataframe(
            &df,
            &["age", "stage", "smoker", "sex"],
            &["death", "relapse"],
        )
        .unwrap();

        let levels: Vec<ScaleLevel> = data.scale_levels.iter().map(|f| f.level).collect();
        assert_eq!(
            levels,
            vec![
                ScaleLevel::Continuous,
                ScaleLevel::Ordinal,
                ScaleLevel::Nominal,
                ScaleLevel::Nominal
            ]
        );
        assert_eq!(data.scale_levels.get("sex").unwrap().categories, vec!["f", "m"]);
        assert_eq!(data.x.column(3).to_vec(), vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(data.x.dim(), (6, 4));
        assert_eq!(data.y.dim(), (6, 2));
        assert_eq!(data.target("relapse").unwrap().to_vec(), vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_drops_rows_with_nulls() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0), Some(4.0)],
            "t" => &[Some(0i64), Some(1), None, Some(1)]
        )
        .unwrap();
        let data = features_and_targets_from_dataframe(&df, &["a"], &["t"]).unwrap();
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.x.column(0).to_vec(), vec![1.0, 4.0]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let df = sample_df();
        assert!(matches!(
            features_and_targets_from_dataframe(&df, &["height"], &["death"]),
            Err(RacoonsError::FeatureNotFound(_))
        ));
        // "stage" has four values, not a binary target
        assert!(features_and_targets_from_dataframe(&df, &["age"], &["stage"]).is_err());
    }

    #[test]
    fn test_feature_subset() {
        let df = sample_df();
        let data = features_and_targets_from_dataframe(&df, &["age", "sex"], &["death"]).unwrap();
        let (x, levels) = data.feature_subset(&["sex"]).unwrap();
        assert_eq!(x.ncols(), 1);
        assert_eq!(levels.names(), vec!["sex"]);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut df = sample_df();
        DataSaver::save_csv(&mut df, &path).unwrap();

        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.shape(), df.shape());
        assert_eq!(loaded.get_column_names(), df.get_column_names());
    }
}
