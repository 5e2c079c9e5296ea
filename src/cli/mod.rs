//! Racoons CLI Module
//!
//! Command-line entry points for the classification drivers.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::classification::{
    grid_search_multivariate_classification_with_config, multivariate_classification_with_config,
    univariate_classification_with_config, ClassificationConfig,
};
use crate::pipeline::{FEATURE_SELECTION_METHODS, SAMPLE_METHODS};
use crate::training::models::{available_classifiers, DISABLED_CLASSIFIERS};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "racoons")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-validated binary classification on tabular data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments shared by every driver
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Input data file (CSV or TSV)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Feature columns, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub features: Vec<String>,

    /// Binary target columns, comma separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub targets: Vec<String>,

    /// Estimators to evaluate (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub estimators: Vec<String>,

    /// Oversampling method (smote)
    #[arg(long)]
    pub sample_method: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write HTML plots next to the results
    #[arg(long)]
    pub plots: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate each estimator on all features against every target
    Multivariate {
        #[command(flatten)]
        args: RunArgs,

        /// Feature selection method (lasso)
        #[arg(long)]
        feature_selection: Option<String>,
    },

    /// Evaluate each estimator on one feature at a time
    Univariate {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Grid search the best estimator per target
    GridSearch {
        #[command(flatten)]
        args: RunArgs,

        /// Feature selection method (lasso)
        #[arg(long)]
        feature_selection: Option<String>,
    },

    /// List the available estimators and methods
    Estimators,

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Which driver a run dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Multivariate,
    Univariate,
    GridSearch,
}

impl Driver {
    fn label(&self) -> &'static str {
        match self {
            Driver::Multivariate => "Multivariate classification",
            Driver::Univariate => "Univariate classification",
            Driver::GridSearch => "Grid search classification",
        }
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    Ok(DataLoader::new().load_auto(path)?)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ClassificationConfig> {
    match path {
        Some(p) => Ok(ClassificationConfig::from_json_file(p)?),
        None => Ok(ClassificationConfig::default()),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    driver: Driver,
    args: &RunArgs,
    feature_selection: Option<&str>,
) -> anyhow::Result<DataFrame> {
    section(driver.label());

    let mut config = load_config(args.config.as_deref())?;
    if args.plots {
        config = config.with_save_plots(true);
    }
    let estimators: Vec<String> = if args.estimators.is_empty() {
        available_classifiers().into_iter().map(str::to_string).collect()
    } else {
        args.estimators.clone()
    };

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(&args.data)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!("Evaluating {} estimator(s)", estimators.len().to_string().cyan()));
    let start = Instant::now();
    let sample_method = args.sample_method.as_deref();
    let results = match driver {
        Driver::Multivariate => multivariate_classification_with_config(
            &df,
            &args.features,
            &args.targets,
            feature_selection,
            sample_method,
            &estimators,
            &args.output,
            &config,
        )?,
        Driver::Univariate => univariate_classification_with_config(
            &df,
            &args.features,
            &args.targets,
            sample_method,
            &estimators,
            &args.output,
            &config,
        )?,
        Driver::GridSearch => grid_search_multivariate_classification_with_config(
            &df,
            &args.features,
            &args.targets,
            feature_selection,
            sample_method,
            &estimators,
            &args.output,
            &config,
        )?,
    };
    step_done(&format!("{} rows in {:?}", results.height(), start.elapsed()));

    print_summary(&results)?;
    println!("  {:<12} {}", muted("Output"), args.output.display());
    println!();
    Ok(results)
}

fn print_summary(results: &DataFrame) -> anyhow::Result<()> {
    let target = results.column("target")?.as_materialized_series().str()?.clone();
    let estimator = results.column("estimator")?.as_materialized_series().str()?.clone();
    let auc = results.column("auc_mean")?.as_materialized_series().cast(&DataType::Float64)?;
    let auc = auc.f64()?;
    let feature = results
        .column("feature")
        .ok()
        .map(|c| c.as_materialized_series().cast(&DataType::String))
        .transpose()?;
    let feature = feature.as_ref().map(|s| s.str()).transpose()?;

    println!();
    println!("  {:<20} {:<20} {:<16} {:>8}", muted("Target"), muted("Estimator"), muted("Feature"), muted("AUC"));
    println!("  {}", dim(&"─".repeat(68)));
    for i in 0..results.height() {
        let score = auc.get(i).unwrap_or(f64::NAN);
        let score = if score.is_finite() {
            format!("{:.4}", score).white()
        } else {
            "n/a".yellow()
        };
        println!(
            "  {:<20} {:<20} {:<16} {:>8}",
            target.get(i).unwrap_or(""),
            estimator.get(i).unwrap_or(""),
            feature.and_then(|f| f.get(i)).unwrap_or("all"),
            score
        );
    }
    println!("  {}", dim(&"─".repeat(68)));
    Ok(())
}

pub fn cmd_estimators() -> anyhow::Result<()> {
    section("Estimators");
    for name in available_classifiers() {
        println!("  {} {}", ok("✓"), name.white());
    }
    for name in DISABLED_CLASSIFIERS {
        println!("  {} {} {}", dim("·"), name.truecolor(140, 140, 140), dim("(disabled)"));
    }

    section("Methods");
    println!("  {:<20} {}", muted("sample_method"), SAMPLE_METHODS.join(", "));
    println!("  {:<20} {}", muted("feature_selection"), FEATURE_SELECTION_METHODS.join(", "));
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_data(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}
