//! # demand_bench
//!
//! Command-line interface that ranks forecasting strategies on a CSV of
//! retail transactions.

use clap::{Parser, ValueEnum};
use demand_forecast::config::HarnessConfig;
use demand_forecast::data::DataLoader;
use demand_forecast::harness::{Harness, ProductOutcome, Report};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// One series for the whole table
    Single,
    /// One series per top-N product
    Catalog,
}

#[derive(Parser)]
#[command(name = "demand_bench")]
#[command(about = "Compare demand forecasting strategies on transaction data", long_about = None)]
struct Cli {
    /// Input CSV with a header row
    #[arg(short, long)]
    input: PathBuf,

    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "catalog")]
    mode: Mode,

    /// Products to evaluate in catalog mode, overrides the config
    #[arg(long)]
    top_n: Option<usize>,

    /// Holdout and forecast length, overrides the config
    #[arg(long)]
    horizon: Option<usize>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.as_str().into()))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run failed");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_json_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(top_n) = cli.top_n {
        config.top_n = top_n;
    }
    if let Some(horizon) = cli.horizon {
        config.horizon = horizon;
    }

    let table = DataLoader::from_csv(&cli.input, config.schema.clone())?;
    let harness = Harness::new(config)?;
    let report = match cli.mode {
        Mode::Single => harness.run_single(&table)?,
        Mode::Catalog => harness.run_catalog(&table)?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &Report) {
    if let Some(summary) = &report.cleaning {
        println!(
            "Rows: {} read, {} without timestamp, {} without quantity, {} returns, {} labels imputed",
            summary.rows_in,
            summary.missing_timestamp,
            summary.missing_quantity,
            summary.negative_quantity,
            summary.labels_imputed
        );
    }
    println!("Horizon: {}\n", report.horizon);

    for outcome in &report.products {
        match outcome {
            ProductOutcome::Evaluated(product) => {
                println!(
                    "{} (train {}, holdout {})",
                    product.product, product.train_len, product.holdout_len
                );
                for record in product.ranking() {
                    let flags: Vec<String> =
                        record.flags.iter().map(|f| format!("{:?}", f)).collect();
                    println!(
                        "  {:<28} RMSE {:>12.4}  {}",
                        record.strategy,
                        record.rmse,
                        flags.join(", ")
                    );
                }
                for (strategy, failure) in product.failures() {
                    println!(
                        "  {:<28} failed at {:?}: {}",
                        strategy, failure.stage, failure.message
                    );
                }
            }
            ProductOutcome::Failed { product, failure } => {
                println!("{}: skipped at {:?}: {}", product, failure.stage, failure.message);
            }
        }
        println!();
    }
}
