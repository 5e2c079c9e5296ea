//! Hyperparameter search space
//!
//! Grids of named parameter values expanded into candidate sets for
//! exhaustive search.

pub mod search_space;

pub use search_space::{split_param_key, ParamGrid, ParamSet, ParamValue, PARAM_SEPARATOR};
