//! pstan CLI: run the feature pipeline over local bar files.
//!
//! Commands:
//! - `run`: enrich CSV/Parquet files with every stage's columns and list signal bars
//! - `synthetic`: run the pipeline over seeded random-walk series
//! - `config`: print the default pipeline configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pstan_core::data::{read_table, write_csv};
use pstan_core::processors::{Signals, DEFAULT_WINDOW};
use pstan_core::synthetic::random_walk_batch;
use pstan_core::{Pipeline, PipelineConfig, SignalHit, StageRegistry, Table};

#[derive(Parser)]
#[command(
    name = "pstan",
    about = "pstan: staged indicator and signal pipeline for intraday bars"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over one or more CSV/Parquet bar files.
    Run {
        /// Input files (.csv, .parquet).
        #[arg(long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Path to a TOML pipeline config. Defaults to the full chain.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Window for the default chain. Ignored when --config is given.
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,

        /// Directory for `<stem>.enriched.csv` (and reports).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Emit a JSON run report per input.
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    /// Run the default chain over seeded synthetic random-walk bars.
    Synthetic {
        /// Bars per series.
        #[arg(long, default_value_t = 2000)]
        bars: usize,

        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of independent series, processed in parallel.
        #[arg(long, default_value_t = 1)]
        series: usize,

        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
    },
    /// Print the default pipeline configuration as TOML.
    Config {
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
    },
}

/// One line per stage in a run report.
#[derive(Debug, Serialize)]
struct StageReport {
    name: String,
    kind: String,
    window: usize,
    summary: Option<String>,
}

/// JSON report written by `run --report`.
#[derive(Debug, Serialize)]
struct RunReport {
    input: String,
    rows: usize,
    config_hash: String,
    generated_at: chrono::DateTime<chrono::Utc>,
    stages: Vec<StageReport>,
    hits: Vec<SignalHit>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            inputs,
            config,
            window,
            output_dir,
            report,
        } => run_files(&inputs, config, window, output_dir, report),
        Commands::Synthetic {
            bars,
            seed,
            series,
            window,
        } => run_synthetic(bars, seed, series, window),
        Commands::Config { window } => {
            check_window(window)?;
            print!("{}", PipelineConfig::default_chain(window).to_toml()?);
            Ok(())
        }
    }
}

fn check_window(window: usize) -> Result<()> {
    if window < 2 {
        bail!("--window must be >= 2, got {window}");
    }
    Ok(())
}

fn run_files(
    inputs: &[PathBuf],
    config_path: Option<PathBuf>,
    window: usize,
    output_dir: Option<PathBuf>,
    report: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => {
            check_window(window)?;
            PipelineConfig::default_chain(window)
        }
    };
    let pipeline = Pipeline::from_config(&config).context("build pipeline")?;
    let config_hash = config.config_hash()?;
    info!(config_hash = %config_hash, stages = config.stages.len(), "pipeline ready");

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir {}", dir.display()))?;
    }

    // Files are independent: load and run them in parallel, report in order.
    let outcomes: Vec<Result<(Table, StageRegistry)>> = inputs
        .par_iter()
        .map(|path| {
            let table =
                read_table(path).with_context(|| format!("read {}", path.display()))?;
            pipeline
                .run(&table)
                .with_context(|| format!("run pipeline on {}", path.display()))
        })
        .collect();

    let mut failures = 0;
    for (path, outcome) in inputs.iter().zip(outcomes) {
        let (table, registry) = match outcome {
            Ok(done) => done,
            Err(err) => {
                error!("{err:#}");
                failures += 1;
                continue;
            }
        };

        let hits = print_summary(path, &table, &registry)?;

        if let Some(dir) = &output_dir {
            let out = dir.join(format!("{}.enriched.csv", file_stem(path)));
            write_csv(&table, &out).with_context(|| format!("write {}", out.display()))?;
            println!("Enriched table saved to: {}", out.display());
        }

        if report {
            let run_report = RunReport {
                input: path.display().to_string(),
                rows: table.height(),
                config_hash: config_hash.clone(),
                generated_at: chrono::Utc::now(),
                stages: stage_reports(&table, &registry),
                hits,
            };
            let json = serde_json::to_string_pretty(&run_report)?;
            match &output_dir {
                Some(dir) => {
                    let out = dir.join(format!("{}.report.json", file_stem(path)));
                    std::fs::write(&out, json)
                        .with_context(|| format!("write {}", out.display()))?;
                    println!("Report saved to: {}", out.display());
                }
                None => println!("{json}"),
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} inputs failed", inputs.len());
    }
    Ok(())
}

fn run_synthetic(bars: usize, seed: u64, series: usize, window: usize) -> Result<()> {
    check_window(window)?;
    if series == 0 {
        bail!("--series must be >= 1");
    }

    let tables = random_walk_batch(series, bars, seed)
        .iter()
        .map(|b| Table::from_bars(b))
        .collect::<pstan_core::Result<Vec<_>>>()?;
    let pipeline = Pipeline::default_chain(window)?;

    for (i, outcome) in pipeline.run_batch(&tables).into_iter().enumerate() {
        let (table, registry) = outcome.with_context(|| format!("synthetic series {i}"))?;
        print_summary(Path::new(&format!("synthetic-{seed}-{i}")), &table, &registry)?;
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string())
}

fn stage_reports(table: &Table, registry: &StageRegistry) -> Vec<StageReport> {
    registry
        .iter()
        .map(|(name, stage)| StageReport {
            name: name.to_string(),
            kind: stage.kind().to_string(),
            window: stage.window(),
            summary: stage.summary(table),
        })
        .collect()
}

fn print_summary(
    source: &Path,
    table: &Table,
    registry: &StageRegistry,
) -> Result<Vec<SignalHit>> {
    println!();
    println!("=== {} ===", source.display());
    println!("Rows:    {}", table.height());
    println!("Columns: {}", table.column_names().len());
    println!();
    println!("{:<12} {:<10} {:>6}  Summary", "Stage", "Kind", "Window");
    println!("{}", "-".repeat(60));
    for report in stage_reports(table, registry) {
        println!(
            "{:<12} {:<10} {:>6}  {}",
            report.name,
            report.kind,
            report.window,
            report.summary.unwrap_or_default()
        );
    }

    if !table.has_column("Signal") {
        return Ok(Vec::new());
    }
    let hits = Signals::hits(table)?;
    println!();
    println!("Signals: {}", hits.len());
    for hit in &hits {
        println!("  row {:>6}  {}  close {:.4}", hit.row, hit.timestamp, hit.close);
    }
    Ok(hits)
}
