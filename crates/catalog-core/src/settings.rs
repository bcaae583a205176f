use clap::{CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Daily statistics and time series for a dated catalog snapshot archive
#[derive(Parser, Debug, Clone)]
#[command(
    name = "catalog-stats",
    about = "Daily statistics and time series for a dated catalog snapshot archive",
    version
)]
pub struct Settings {
    /// What to run: daily statistics, the series fold, or both
    #[arg(long, default_value = "all", value_parser = ["daily", "series", "all"])]
    pub mode: String,

    /// Folder holding one sub-folder per capture (YYYYMMDDTHHMMSS)
    #[arg(long, default_value = "data/data_gov_catalog_ndjson")]
    pub data_folder: PathBuf,

    /// Folder receiving one statistics file per capture
    #[arg(long, default_value = "data/daily_statistics")]
    pub statistics_folder: PathBuf,

    /// Folder receiving the folded series for the dashboard
    #[arg(long, default_value = "web/static/data")]
    pub web_data_folder: PathBuf,

    /// Organization exclusion list, one identifier per line
    #[arg(long, default_value = "excluded_organizations.csv")]
    pub exclusions: PathBuf,

    /// File extension of snapshot shard files
    #[arg(long, default_value = "ndjson")]
    pub shard_extension: String,

    /// JSON config file (defaults to ~/.catalog-stats/config.json when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── FileConfig ─────────────────────────────────────────────────────────────────

/// Values read from the JSON config file. Every field is optional; a value
/// given on the command line always wins.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data_folder: Option<PathBuf>,
    pub statistics_folder: Option<PathBuf>,
    pub web_data_folder: Option<PathBuf>,
    pub exclusions: Option<PathBuf>,
    pub shard_extension: Option<String>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Default location, `~/.catalog-stats/config.json`.
    pub fn default_path() -> PathBuf {
        Self::default_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Default location rooted at `base_dir` (used for testing).
    pub fn default_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".catalog-stats").join("config.json")
    }

    /// Read the config at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist. A file that exists
    /// but cannot be read or parsed is an error.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            CatalogError::Config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        Ok(Some(config))
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge the config file underneath them.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os().collect(), &FileConfig::default_path())
    }

    /// Same as [`Settings::load`] with explicit arguments and default config
    /// location, so tests can redirect to a temporary directory.
    pub fn load_from_args(
        args: Vec<std::ffi::OsString>,
        default_config_path: &Path,
    ) -> Result<Self> {
        // Raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args);
        let mut settings =
            Settings::from_arg_matches(&matches).map_err(|e| CatalogError::Config(e.to_string()))?;

        let file_config = match settings.config.as_deref() {
            Some(explicit) => Some(FileConfig::load_from(explicit)?.ok_or_else(|| {
                CatalogError::Config(format!("config file not found: {}", explicit.display()))
            })?),
            None => FileConfig::load_from(default_config_path)?,
        };

        if let Some(file_config) = file_config {
            settings.merge_file_config(file_config, &matches);
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings.shard_extension = settings.shard_extension.trim_start_matches('.').to_string();
        if settings.shard_extension.is_empty() {
            return Err(CatalogError::Config(
                "shard extension must not be empty".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Apply config-file values to every field not given on the command line.
    fn merge_file_config(&mut self, config: FileConfig, matches: &clap::ArgMatches) {
        // NOTE: clap stores the arg id using the *field name* (underscores),
        // not the long-flag spelling (hyphens).
        if !is_arg_explicitly_set(matches, "data_folder") {
            if let Some(v) = config.data_folder {
                self.data_folder = v;
            }
        }
        if !is_arg_explicitly_set(matches, "statistics_folder") {
            if let Some(v) = config.statistics_folder {
                self.statistics_folder = v;
            }
        }
        if !is_arg_explicitly_set(matches, "web_data_folder") {
            if let Some(v) = config.web_data_folder {
                self.web_data_folder = v;
            }
        }
        if !is_arg_explicitly_set(matches, "exclusions") {
            if let Some(v) = config.exclusions {
                self.exclusions = v;
            }
        }
        if !is_arg_explicitly_set(matches, "shard_extension") {
            if let Some(v) = config.shard_extension {
                self.shard_extension = v;
            }
        }
        if !is_arg_explicitly_set(matches, "log_level") {
            if let Some(v) = config.log_level {
                self.log_level = v;
            }
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
