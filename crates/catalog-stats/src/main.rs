mod bootstrap;

use std::time::Instant;

use anyhow::{Context, Result};
use catalog_core::settings::Settings;
use catalog_runtime::orchestrator::{RunOrchestrator, RunSummary};

/// Exit status used when the run is interrupted by Ctrl+C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("catalog-stats v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Mode: {}, data: {}, statistics: {}, web data: {}",
        settings.mode,
        settings.data_folder.display(),
        settings.statistics_folder.display(),
        settings.web_data_folder.display()
    );

    let orchestrator =
        RunOrchestrator::from_settings(&settings).context("failed to prepare the run")?;
    bootstrap::ensure_directories(&settings, orchestrator.mode())?;

    let started = Instant::now();

    // The run lives on a blocking thread that cannot be cancelled; on Ctrl+C
    // the process exits and any in-flight write is dropped before its rename.
    tokio::select! {
        result = orchestrator.run() => {
            let summary = result.context("run failed")?;
            log_summary(&summary, started);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Ctrl+C received; aborting run");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }

    Ok(())
}

fn log_summary(summary: &RunSummary, started: Instant) {
    if let Some(daily) = &summary.daily {
        tracing::info!(
            "Daily statistics: {} written, {} already present",
            daily.processed.len(),
            daily.skipped
        );
    }
    if let Some(series) = &summary.series {
        tracing::info!(
            "Series: {} ({} organization files)",
            series.series_file.display(),
            series.organization_files
        );
    }
    tracing::info!("Finished in {:.1}s", started.elapsed().as_secs_f64());
}
