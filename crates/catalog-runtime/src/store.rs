//! On-disk store of [`DailyStatistics`] artifacts, one JSON file per date.
//!
//! Artifacts are write-once: [`StatisticsStore::write`] refuses to replace an
//! existing file, so a rerun can only fill in dates that are missing.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use catalog_core::error::{CatalogError, Result};
use catalog_core::statistics::DailyStatistics;
use serde::Serialize;
use walkdir::WalkDir;

const ARTIFACT_EXTENSION: &str = "json";

/// Serialize `value` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CatalogError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_vec(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|source| CatalogError::FileWrite {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| CatalogError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

// ── StatisticsStore ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StatisticsStore {
    root: PathBuf,
}

impl StatisticsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the artifact for `date` (`<root>/<date>.json`).
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.root.join(format!("{date}.{ARTIFACT_EXTENSION}"))
    }

    pub fn contains(&self, date: &str) -> bool {
        self.path_for(date).is_file()
    }

    /// Persist `stats` under its date.
    ///
    /// # Errors
    /// [`CatalogError::ArtifactExists`] when an artifact for the date is
    /// already present; the existing file is left untouched.
    pub fn write(&self, stats: &DailyStatistics) -> Result<PathBuf> {
        let path = self.path_for(&stats.date);
        if path.exists() {
            return Err(CatalogError::ArtifactExists(path));
        }
        write_json_atomic(&path, stats)?;
        tracing::debug!(path = %path.display(), "daily statistics written");
        Ok(path)
    }

    /// Every artifact file, sorted by file name (and therefore by date).
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(CatalogError::DataPathNotFound(self.root.clone()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| CatalogError::Io(e.into()))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION)
            {
                paths.push(path.to_path_buf());
            }
        }
        Ok(paths)
    }

    /// Read one artifact.
    pub fn load(path: &Path) -> Result<DailyStatistics> {
        let file = File::open(path).map_err(|source| CatalogError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Lazily load every artifact in date order.
    pub fn load_all(&self) -> Result<impl Iterator<Item = Result<DailyStatistics>>> {
        let paths = self.list()?;
        tracing::info!("Found {} daily statistics files", paths.len());
        Ok(paths.into_iter().map(|path| {
            tracing::debug!(path = %path.display(), "loading daily statistics");
            Self::load(&path)
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
