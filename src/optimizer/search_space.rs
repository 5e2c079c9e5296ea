//! Hyperparameter values and stage-qualified parameter grids

use crate::error::{RacoonsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between a pipeline stage name and the parameter it owns
pub const PARAM_SEPARATOR: &str = "__";

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl ParamValue {
    pub fn str(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }

    /// Interpret as a float; integers are widened
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(RacoonsError::invalid_parameter(name, other, "expected a number")),
        }
    }

    pub fn as_i64(&self, name: &str) -> Result<i64> {
        match self {
            ParamValue::Int(v) => Ok(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            other => Err(RacoonsError::invalid_parameter(name, other, "expected an integer")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        let v = self.as_i64(name)?;
        if v < 1 {
            return Err(RacoonsError::invalid_parameter(name, v, "must be at least 1"));
        }
        Ok(v as usize)
    }

    /// `None` maps to `Option::None`, anything else must be a positive integer
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Str(s) => Ok(s.as_str()),
            other => Err(RacoonsError::invalid_parameter(name, other, "expected a string")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
            ParamValue::None => write!(f, "None"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// One point of a grid: fully-qualified parameter name to value
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Mapping from stage-qualified parameter name to its candidate values.
///
/// Keys are kept sorted so candidate enumeration is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidates for one parameter
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        self.params.insert(name.into(), values);
    }

    pub fn with(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.insert(name, values);
        self
    }

    /// Merge another grid under a stage prefix, e.g. `estimator` + `C`
    /// becomes `estimator__C`
    pub fn extend_prefixed(&mut self, prefix: &str, other: ParamGrid) {
        for (name, values) in other.params {
            self.params
                .insert(format!("{}{}{}", prefix, PARAM_SEPARATOR, name), values);
        }
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.params.get(name).map(|v| v.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of points in the cartesian product
    pub fn n_candidates(&self) -> usize {
        self.params.values().map(|v| v.len()).product()
    }

    /// Enumerate the cartesian product in key order, last key varying fastest
    pub fn candidates(&self) -> Vec<ParamSet> {
        let mut out: Vec<ParamSet> = vec![ParamSet::new()];
        for (name, values) in &self.params {
            if values.is_empty() {
                return Vec::new();
            }
            let mut next = Vec::with_capacity(out.len() * values.len());
            for partial in &out {
                for value in values {
                    let mut set = partial.clone();
                    set.insert(name.clone(), value.clone());
                    next.push(set);
                }
            }
            out = next;
        }
        out
    }
}

/// Split `stage__rest` into `("stage", "rest")`
pub fn split_param_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(PARAM_SEPARATOR)
}
