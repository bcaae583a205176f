use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use catalog_core::settings::Settings;
use catalog_runtime::orchestrator::RunMode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Create the output folders the selected mode writes to.
///
/// - `daily` / `all`: the statistics folder
/// - `series` / `all`: the web data folder
///
/// The statistics folder is not created for a `series` run, so a mistyped
/// path still fails instead of producing an empty series.
pub fn ensure_directories(settings: &Settings, mode: RunMode) -> anyhow::Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    if mode.runs_daily() {
        created.push(settings.statistics_folder.clone());
    }
    if mode.runs_series() {
        created.push(settings.web_data_folder.clone());
    }
    for dir in &created {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create directory {}", dir.display()))?;
    }
    Ok(created)
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map the CLI level names onto `EnvFilter` directives.
fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Open `path` for appending, creating it and its parent folder if needed.
fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Initialise the global `tracing` subscriber.
///
/// Output always goes to stderr; when `log_file` is given it is also
/// appended there, without ANSI colours. Unrecognised levels fall back to
/// `"info"`.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("tracing subscriber already initialised")?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
