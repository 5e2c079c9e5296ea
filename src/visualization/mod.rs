//! Visualization module: feature-importance and ROC plots rendered with plotly.

use crate::error::{RacoonsError, Result};
use crate::validation::CrossValidation;
use plotly::common::{DashType, Line, Mode, Orientation};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, Plot, Scatter};
use polars::prelude::*;
use std::path::Path;

/// Mean importance of every column, nulls ignored, sorted descending
pub fn mean_importances(table: &DataFrame) -> Result<Vec<(String, f64)>> {
    let mut means = table
        .get_columns()
        .iter()
        .map(|col| {
            let series = col.as_materialized_series().cast(&DataType::Float64)?;
            let mean = series.f64()?.mean().unwrap_or(f64::NAN);
            Ok((col.name().to_string(), mean))
        })
        .collect::<Result<Vec<_>>>()?;
    means.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(means)
}

/// Horizontal bar chart of the mean importance per feature
pub fn plot_feature_importances(table: &DataFrame) -> Result<Plot> {
    if table.width() == 0 {
        return Err(RacoonsError::DataError(
            "Feature importance table has no columns".to_string(),
        ));
    }
    let means = mean_importances(table)?;

    // plotly draws the first category at the bottom
    let (names, values): (Vec<String>, Vec<f64>) = means.into_iter().rev().unzip();
    let trace = Bar::new(values, names)
        .orientation(Orientation::Horizontal)
        .name("importance");

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title("Feature importance")
            .x_axis(Axis::new().title("Mean importance"))
            .y_axis(Axis::new().title("Feature")),
    );
    Ok(plot)
}

/// Per-fold ROC curves, the mean curve and the chance diagonal
pub fn plot_roc_curves(cv: &CrossValidation, title: &str) -> Result<Plot> {
    let fpr = cv.mean_fpr.to_vec();
    let mut plot = Plot::new();

    for (fold, (tpr, auc)) in cv.tprs.iter().zip(cv.aucs.iter()).enumerate() {
        if !auc.is_finite() {
            continue;
        }
        let trace = Scatter::new(fpr.clone(), tpr.to_vec())
            .mode(Mode::Lines)
            .name(&format!("fold {} (AUC = {:.2})", fold, auc))
            .opacity(0.3);
        plot.add_trace(trace);
    }

    let (auc_mean, auc_std) = cv.auc_summary();
    let mean = Scatter::new(fpr, cv.mean_tpr().to_vec())
        .mode(Mode::Lines)
        .name(&format!("mean (AUC = {:.2} ± {:.2})", auc_mean, auc_std))
        .line(Line::new().color("blue").width(2.0));
    plot.add_trace(mean);

    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("chance")
        .line(Line::new().color("red").dash(DashType::Dash));
    plot.add_trace(chance);

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False positive rate"))
            .y_axis(Axis::new().title("True positive rate")),
    );
    Ok(plot)
}

/// Write a plot as a standalone HTML document
pub fn save_plot<P: AsRef<Path>>(plot: &Plot, path: P) -> Result<()> {
    std::fs::write(path.as_ref(), plot.to_html())?;
    Ok(())
}
