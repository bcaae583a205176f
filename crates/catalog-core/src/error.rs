use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the catalog statistics engine.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written to disk.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A shard line is not a complete, parseable record.
    ///
    /// Usually the fragment of a record whose serialized form contained an
    /// embedded line break.
    #[error("Malformed record in {path} at line {line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A snapshot folder name is not a `YYYYMMDDTHHMMSS` capture timestamp.
    #[error("Invalid snapshot name: {0}")]
    InvalidSnapshotName(String),

    /// A capture folder holds no shard files, so it cannot describe the
    /// catalog.
    #[error("Snapshot has no shard files: {0}")]
    EmptySnapshot(PathBuf),

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// The organization exclusion list could not be loaded.
    #[error("Exclusion list error ({path}): {reason}")]
    ExclusionList { path: PathBuf, reason: String },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A daily statistics artifact already exists and must not be rewritten.
    #[error("Statistics artifact already exists: {0}")]
    ArtifactExists(PathBuf),

    /// Two organizations would be written to the same per-organization file.
    #[error("Organizations {first} and {second} both map to file stem {stem}")]
    FileStemCollision {
        stem: String,
        first: String,
        second: String,
    },

    /// Daily statistics were folded out of date order.
    #[error("Series out of order: {current} does not follow {previous}")]
    SeriesOrder { previous: String, current: String },

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the catalog crates.
pub type Result<T> = std::result::Result<T, CatalogError>;
