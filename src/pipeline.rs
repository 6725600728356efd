use crate::config::Settings;
use crate::data::{Enricher, Fetcher};
use crate::error::PipelineError;
use crate::storage::{ObjectStore, Publisher};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of one scheduled run: which symbol, for which logical date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub symbol: String,
    pub logical_date: NaiveDate,
}

impl RunContext {
    pub fn new(symbol: impl Into<String>, logical_date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            logical_date,
        }
    }

    /// Parses a scheduler-supplied `YYYY-MM-DD` logical date.
    pub fn parse(symbol: impl Into<String>, ds: &str) -> Result<Self> {
        let logical_date = NaiveDate::parse_from_str(ds.trim(), "%Y-%m-%d")
            .with_context(|| format!("logical date must be YYYY-MM-DD, got '{ds}'"))?;
        Ok(Self::new(symbol, logical_date))
    }

    pub fn ds(&self) -> String {
        self.logical_date.format("%Y-%m-%d").to_string()
    }
}

/// Local intermediate files for one run.
///
/// Paths are derived from the run identity, so every step of the same run
/// finds the same files and runs for different dates never share one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub enriched: PathBuf,
}

impl ArtifactPaths {
    pub fn for_run(work_dir: &Path, ctx: &RunContext) -> Self {
        let suffix = format!("{}_{}", ctx.symbol, ctx.ds());
        Self {
            raw: work_dir.join(format!("stock_raw_{suffix}.csv")),
            enriched: work_dir.join(format!("stock_transformed_{suffix}.csv")),
        }
    }
}

/// Where a run stands. `Failed` is reachable from every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Extracted,
    Transformed,
    Loaded,
    Failed,
}

impl Stage {
    /// Moves one step forward along extract → transform → load.
    pub fn advance(self) -> Result<Self, PipelineError> {
        let next = match self {
            Stage::Pending => Stage::Extracted,
            Stage::Extracted => Stage::Transformed,
            Stage::Transformed => Stage::Loaded,
            terminal => {
                return Err(PipelineError::IllegalTransition {
                    from: terminal.to_string(),
                    to: "next".to_string(),
                })
            }
        };
        Ok(next)
    }

    pub fn fail(self) -> Result<Self, PipelineError> {
        if self.is_terminal() {
            return Err(PipelineError::IllegalTransition {
                from: self.to_string(),
                to: Stage::Failed.to_string(),
            });
        }
        Ok(Stage::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Loaded | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "PENDING",
            Stage::Extracted => "EXTRACTED",
            Stage::Transformed => "TRANSFORMED",
            Stage::Loaded => "LOADED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub stage: Stage,
    pub raw_rows: usize,
    pub enriched_rows: usize,
    pub object_key: String,
}

/// Sequences the three steps for one symbol.
///
/// Each step can be called on its own; the scheduler owns retries and the
/// dependency order between separately launched steps.
pub struct Pipeline<S> {
    fetcher: Fetcher,
    enricher: Enricher,
    publisher: Publisher<S>,
    work_dir: PathBuf,
    timeseries: usize,
}

impl<S: ObjectStore> Pipeline<S> {
    pub fn new(
        fetcher: Fetcher,
        enricher: Enricher,
        publisher: Publisher<S>,
        work_dir: impl Into<PathBuf>,
        timeseries: usize,
    ) -> Self {
        Self {
            fetcher,
            enricher,
            publisher,
            work_dir: work_dir.into(),
            timeseries,
        }
    }

    pub fn from_settings(settings: &Settings, store: S) -> Self {
        Self::new(
            Fetcher::from_settings(settings),
            Enricher::with_order(settings.window_order),
            Publisher::new(store, settings.s3_bucket.clone()),
            settings.work_dir.clone(),
            settings.timeseries,
        )
    }

    pub fn artifacts(&self, ctx: &RunContext) -> ArtifactPaths {
        ArtifactPaths::for_run(&self.work_dir, ctx)
    }

    pub fn publisher(&self) -> &Publisher<S> {
        &self.publisher
    }

    pub async fn extract(&self, ctx: &RunContext) -> Result<usize> {
        let artifacts = self.artifacts(ctx);
        self.fetcher
            .extract(&ctx.symbol, self.timeseries, &artifacts.raw)
            .await
            .context("extract step failed")
    }

    pub fn transform(&self, ctx: &RunContext) -> Result<usize> {
        let artifacts = self.artifacts(ctx);
        self.enricher
            .transform(&artifacts.raw, &artifacts.enriched)
            .context("transform step failed")
    }

    pub async fn load(&self, ctx: &RunContext) -> Result<String> {
        let artifacts = self.artifacts(ctx);
        self.publisher
            .publish(ctx, &artifacts)
            .await
            .context("load step failed")
    }

    /// Runs extract, transform and load in order, stopping at the first failure.
    pub async fn run(&self, ctx: &RunContext) -> Result<RunReport> {
        let mut stage = Stage::Pending;
        tracing::info!(symbol = %ctx.symbol, ds = %ctx.ds(), %stage, "pipeline run started");

        let raw_rows = match self.extract(ctx).await {
            Ok(rows) => rows,
            Err(err) => return Err(self.failed(ctx, stage, err)),
        };
        stage = self.advance(ctx, stage)?;

        let enriched_rows = match self.transform(ctx) {
            Ok(rows) => rows,
            Err(err) => return Err(self.failed(ctx, stage, err)),
        };
        stage = self.advance(ctx, stage)?;

        let object_key = match self.load(ctx).await {
            Ok(key) => key,
            Err(err) => return Err(self.failed(ctx, stage, err)),
        };
        stage = self.advance(ctx, stage)?;

        Ok(RunReport {
            stage,
            raw_rows,
            enriched_rows,
            object_key,
        })
    }

    fn advance(&self, ctx: &RunContext, stage: Stage) -> Result<Stage> {
        let next = stage.advance()?;
        tracing::info!(symbol = %ctx.symbol, ds = %ctx.ds(), from = %stage, to = %next, "stage transition");
        Ok(next)
    }

    fn failed(&self, ctx: &RunContext, stage: Stage, err: anyhow::Error) -> anyhow::Error {
        let next = stage.fail().unwrap_or(Stage::Failed);
        tracing::error!(
            symbol = %ctx.symbol,
            ds = %ctx.ds(),
            from = %stage,
            to = %next,
            error = %format!("{err:#}"),
            "pipeline run failed"
        );
        err.context(format!("run for {} on {} ended in {next}", ctx.symbol, ctx.ds()))
    }
}
