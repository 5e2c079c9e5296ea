//! Racoons - Main Entry Point

use clap::Parser;
use racoons::cli::{cmd_estimators, cmd_info, cmd_run, Cli, Commands, Driver};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "racoons=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Multivariate { args, feature_selection }) => {
            cmd_run(Driver::Multivariate, &args, feature_selection.as_deref())?;
        }
        Some(Commands::Univariate { args }) => {
            cmd_run(Driver::Univariate, &args, None)?;
        }
        Some(Commands::GridSearch { args, feature_selection }) => {
            cmd_run(Driver::GridSearch, &args, feature_selection.as_deref())?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        Some(Commands::Estimators) | None => {
            cmd_estimators()?;
        }
    }

    Ok(())
}
