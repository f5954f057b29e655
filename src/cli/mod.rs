//! Command-line interface
//!
//! Each subcommand runs one pipeline stage; `run` chains all three.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::{run_ensemble, run_ingestion, run_training};
use crate::training::ModelKind;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "diabetes-ensemble")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-validated boosting ensemble for diabetes diagnosis")]
#[command(long_about = None)]
pub struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `paths.data_dir`
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override `paths.artifacts_dir`
    #[arg(long, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the raw tables and write the processed copies
    Ingest,

    /// Train every configured classifier type with K-fold cross-validation
    Train {
        /// Number of folds
        #[arg(long)]
        folds: Option<usize>,

        /// Global random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Classifier types to train (lightgbm, xgboost, catboost)
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<ModelKind>,
    },

    /// Score the processed test table and write the submission
    Ensemble,

    /// Ingest, train and ensemble in sequence
    Run,
}

impl Cli {
    /// Configuration from `--config` with the path overrides applied
    pub fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.paths.data_dir = dir.clone();
        }
        if let Some(dir) = &self.artifacts_dir {
            config.paths.artifacts_dir = dir.clone();
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_ingest(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Ingest");

    step_run(&format!("Checking {}", config.paths.data_dir.join("raw").display()));
    let start = Instant::now();
    let summary = run_ingestion(config)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {}", muted("Train rows"), summary.train_rows.to_string().white());
    println!("  {:<16} {}", muted("Test rows"), summary.test_rows.to_string().white());
    println!("  {:<16} {}", muted("Duplicates"), summary.duplicates_dropped.to_string().white());
    println!();
    Ok(())
}

pub fn cmd_train(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Train");

    step_run(&format!(
        "Training {} with {} folds",
        config
            .model_kinds
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
            .cyan(),
        config.cv.n_folds
    ));
    let start = Instant::now();
    let report = run_training(config)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        report.n_rows,
        report.n_features,
        start.elapsed()
    ));

    println!();
    println!(
        "  {:<12} {:>10} {:>10} {:>10} {:>10}",
        muted("Model"),
        muted("CV AUC"),
        muted("± std"),
        muted("OOF AUC"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(56)));
    for model in &report.models {
        println!(
            "  {:<12} {:>10.5} {:>10.5} {:>10.5} {:>9.1}s",
            model.kind.name(),
            model.cv.mean_score,
            model.cv.std_score,
            model.oof_report.roc_auc,
            model.training_time_secs
        );
    }
    println!("  {}", dim(&"─".repeat(56)));
    println!(
        "  {} {}",
        muted("summary"),
        config.paths.training_summary_path().display()
    );
    println!();
    Ok(())
}

pub fn cmd_ensemble(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Ensemble");

    let weights = config
        .ensemble_weights
        .active()
        .map(|(kind, w)| format!("{}={:.2}", kind.name(), w))
        .collect::<Vec<_>>()
        .join(" ");
    step_run(&format!("Scoring with {}", weights.cyan()));
    let start = Instant::now();
    let output = run_ensemble(config)?;
    step_done(&format!("{} rows in {:?}", output.rows, start.elapsed()));

    println!();
    println!("  {} {}", ok("saved"), output.submission_path.display().to_string().white().bold());
    println!();
    Ok(())
}

pub fn cmd_run(config: &PipelineConfig) -> anyhow::Result<()> {
    cmd_ingest(config)?;
    cmd_train(config)?;
    cmd_ensemble(config)
}

/// Dispatch a parsed command line
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut config = cli.load_config()?;

    match cli.command {
        Commands::Ingest => cmd_ingest(&config),
        Commands::Train { folds, seed, models } => {
            if let Some(folds) = folds {
                config = config.with_n_folds(folds);
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            if !models.is_empty() {
                config = config.with_model_kinds(models);
            }
            cmd_train(&config)
        }
        Commands::Ensemble => cmd_ensemble(&config),
        Commands::Run => cmd_run(&config),
    }
}
