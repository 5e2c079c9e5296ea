//! Utility functions and types

pub mod data_loader;

pub use data_loader::{features_and_targets_from_dataframe, DataLoader, DataSaver, Dataset};
