//! diabetes-ensemble entry point

use clap::Parser;
use diabetes_ensemble::cli::{execute, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diabetes_ensemble=info".into()),
        )
        .init();

    execute(Cli::parse())
}
