//! Run coordination for the `catalog-stats` binary.
//!
//! Ties the daily pipeline and the series fold together according to the
//! selected [`RunMode`], and moves the whole (blocking) run onto a tokio
//! blocking thread so the caller's runtime stays free to react to Ctrl+C.

use std::str::FromStr;

use catalog_core::error::{CatalogError, Result};
use catalog_core::exclusions::ExclusionSet;
use catalog_core::settings::Settings;

use crate::accumulator::TimeSeriesAccumulator;
use crate::pipeline::{DailyStatisticsPipeline, PipelineReport};
use crate::series_writer::{SeriesWriteReport, SeriesWriter};
use crate::store::StatisticsStore;

// ── RunMode ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Daily statistics only.
    Daily,
    /// Series fold over existing daily statistics only.
    Series,
    /// Daily statistics, then the series fold.
    All,
}

impl RunMode {
    pub fn runs_daily(self) -> bool {
        matches!(self, RunMode::Daily | RunMode::All)
    }

    pub fn runs_series(self) -> bool {
        matches!(self, RunMode::Series | RunMode::All)
    }
}

impl FromStr for RunMode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(RunMode::Daily),
            "series" => Ok(RunMode::Series),
            "all" => Ok(RunMode::All),
            other => Err(CatalogError::Config(format!("unknown run mode: {other}"))),
        }
    }
}

// ── RunSummary ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub daily: Option<PipelineReport>,
    pub series: Option<SeriesWriteReport>,
}

// ── RunOrchestrator ───────────────────────────────────────────────────────────

pub struct RunOrchestrator {
    mode: RunMode,
    store: StatisticsStore,
    pipeline: Option<DailyStatisticsPipeline>,
    writer: SeriesWriter,
}

impl RunOrchestrator {
    /// Build from resolved settings.
    ///
    /// The exclusion list is only read when the mode computes daily
    /// statistics; a missing or empty list is then fatal.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mode: RunMode = settings.mode.parse()?;
        let store = StatisticsStore::new(&settings.statistics_folder);

        let pipeline = if mode.runs_daily() {
            let exclusions = ExclusionSet::load(&settings.exclusions)?;
            tracing::info!(
                path = %settings.exclusions.display(),
                organizations = exclusions.len(),
                "exclusion list loaded"
            );
            Some(DailyStatisticsPipeline::new(
                &settings.data_folder,
                settings.shard_extension.as_str(),
                exclusions,
                store.clone(),
            ))
        } else {
            None
        };

        Ok(Self {
            mode,
            store,
            pipeline,
            writer: SeriesWriter::new(&settings.web_data_folder),
        })
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Run to completion on the current thread.
    pub fn run_blocking(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if let Some(pipeline) = &self.pipeline {
            summary.daily = Some(pipeline.run()?);
        }

        if self.mode.runs_series() {
            let series = TimeSeriesAccumulator::new()
                .fold_store(&self.store)?
                .finish();
            summary.series = Some(self.writer.write(&series)?);
        }

        Ok(summary)
    }

    /// Run on a tokio blocking thread.
    ///
    /// Dropping the returned future does not stop the blocking thread; the
    /// caller is expected to exit the process instead. Every artifact is
    /// written through a rename, so an interrupted run leaves no partial
    /// file behind.
    pub async fn run(self) -> Result<RunSummary> {
        match tokio::task::spawn_blocking(move || self.run_blocking()).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(CatalogError::Other(anyhow::Error::new(e))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
