mod config;
mod data;
mod error;
mod pipeline;
mod storage;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use config::Settings;
use dotenv::dotenv;
use pipeline::{Pipeline, RunContext};
use storage::{ObjectStore, S3ObjectStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stock_etl", about = "Daily stock price extract, enrich and upload")]
struct Args {
    #[command(subcommand)]
    step: Step,
}

#[derive(Debug, Subcommand)]
enum Step {
    /// Fetch price history and write the raw file.
    Extract(RunArgs),
    /// Append moving averages to the raw file.
    Transform(RunArgs),
    /// Upload the enriched file and remove both intermediates.
    Load(RunArgs),
    /// Run extract, transform and load in one process.
    Run(RunArgs),
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Logical date of the run (YYYY-MM-DD). Defaults to yesterday's UTC date,
    /// the start of the daily interval a scheduler triggers at midnight.
    #[arg(long)]
    ds: Option<String>,
}

impl Step {
    fn run_args(&self) -> &RunArgs {
        match self {
            Step::Extract(args) | Step::Transform(args) | Step::Load(args) | Step::Run(args) => {
                args
            }
        }
    }
}

/// Entry point for one scheduled step (or the whole chain).
///
/// 1. Load `.env` and install logging
/// 2. Resolve settings once; missing credentials end the process here
/// 3. Build the run context from `--ds`
/// 4. Execute the requested step; any error exits non-zero so the scheduler
///    marks the task failed
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::from_env().context("configuration is incomplete")?;
    tracing::debug!(?settings, "loaded settings");

    let ctx = match args.step.run_args().ds.as_deref() {
        Some(ds) => RunContext::parse(settings.symbol.clone(), ds)?,
        None => RunContext::new(
            settings.symbol.clone(),
            default_logical_date(Utc::now().date_naive())?,
        ),
    };

    let store = S3ObjectStore::from_settings(&settings);
    let pipeline = Pipeline::from_settings(&settings, store);
    tracing::info!(
        symbol = %ctx.symbol,
        ds = %ctx.ds(),
        store = pipeline.publisher().store().store_name(),
        bucket = %settings.s3_bucket,
        "pipeline configured"
    );

    match args.step {
        Step::Extract(_) => {
            let rows = pipeline.extract(&ctx).await?;
            tracing::info!(symbol = %ctx.symbol, ds = %ctx.ds(), rows, "extract finished");
        }
        Step::Transform(_) => {
            let rows = pipeline.transform(&ctx)?;
            tracing::info!(symbol = %ctx.symbol, ds = %ctx.ds(), rows, "transform finished");
        }
        Step::Load(_) => {
            let key = pipeline.load(&ctx).await?;
            tracing::info!(symbol = %ctx.symbol, ds = %ctx.ds(), key = %key, "load finished");
        }
        Step::Run(_) => {
            let report = pipeline.run(&ctx).await?;
            tracing::info!(
                symbol = %ctx.symbol,
                ds = %ctx.ds(),
                stage = %report.stage,
                raw_rows = report.raw_rows,
                enriched_rows = report.enriched_rows,
                key = %report.object_key,
                "pipeline run finished"
            );
        }
    }

    Ok(())
}

/// A daily run triggered on `today` covers the interval that started the day before.
fn default_logical_date(today: NaiveDate) -> anyhow::Result<NaiveDate> {
    today
        .pred_opt()
        .with_context(|| format!("no logical date precedes {today}"))
}
