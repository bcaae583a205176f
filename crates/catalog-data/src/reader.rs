//! Snapshot discovery and shard loading.
//!
//! A snapshot is a folder named by its capture timestamp holding one or more
//! line-delimited JSON shard files. Shards are always enumerated sorted by
//! file name and read line by line, which fixes the record order every
//! downstream stage (deduplication in particular) relies on.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use catalog_core::error::{CatalogError, Result};
use catalog_core::models::Record;
use catalog_core::time_utils::SnapshotName;
use tracing::{debug, warn};

/// Sub-folder where the fetcher records failed page requests.
pub const ERRORS_DIR: &str = "errors";

// ── RecordSource ──────────────────────────────────────────────────────────────

/// Anything that can enumerate the records of one snapshot, in a fixed order.
///
/// Enumeration is push-based so implementations can stream from disk without
/// holding the snapshot in memory.
pub trait RecordSource: Send + Sync {
    /// Name used in logs, usually the snapshot folder name.
    fn label(&self) -> &str;

    /// Call `f` once per record, in enumeration order, stopping at the first
    /// error.
    fn for_each_record(&self, f: &mut dyn FnMut(Record) -> Result<()>) -> Result<()>;
}

// ── SnapshotDir ───────────────────────────────────────────────────────────────

/// One capture folder on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDir {
    name: SnapshotName,
    path: PathBuf,
    shards: Vec<PathBuf>,
}

impl SnapshotDir {
    /// Open the capture folder at `path`, listing its shard files.
    pub fn open(path: &Path, extension: &str) -> Result<Self> {
        if !path.is_dir() {
            return Err(CatalogError::DataPathNotFound(path.to_path_buf()));
        }
        let folder_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = SnapshotName::parse(&folder_name)?;
        let shards = find_shard_files(path, extension)?;
        if shards.is_empty() {
            warn!("Snapshot {} has no .{} shard files", name, extension);
        }
        Ok(Self {
            name,
            path: path.to_path_buf(),
            shards,
        })
    }

    pub fn name(&self) -> &SnapshotName {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shard files in enumeration order.
    pub fn shards(&self) -> &[PathBuf] {
        &self.shards
    }

    /// Number of `*.json` files the fetcher left under `errors/`.
    pub fn fetch_error_files(&self) -> Result<usize> {
        let errors = self.path.join(ERRORS_DIR);
        if !errors.is_dir() {
            return Ok(0);
        }
        Ok(find_shard_files(&errors, "json")?.len())
    }
}

impl RecordSource for SnapshotDir {
    fn label(&self) -> &str {
        self.name.as_str()
    }

    fn for_each_record(&self, f: &mut dyn FnMut(Record) -> Result<()>) -> Result<()> {
        for shard in &self.shards {
            read_shard(shard, f)?;
        }
        Ok(())
    }
}

// ── MemorySnapshot ────────────────────────────────────────────────────────────

/// A snapshot already held in memory, enumerated in vector order.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    label: String,
    records: Vec<Record>,
}

impl MemorySnapshot {
    pub fn new(label: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl RecordSource for MemorySnapshot {
    fn label(&self) -> &str {
        &self.label
    }

    fn for_each_record(&self, f: &mut dyn FnMut(Record) -> Result<()>) -> Result<()> {
        for record in &self.records {
            f(record.clone())?;
        }
        Ok(())
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// List the capture folders under `data_folder`, oldest first.
///
/// Sub-folders whose names are not capture timestamps are skipped with a
/// warning. A missing `data_folder` is an error.
pub fn discover_snapshots(data_folder: &Path, extension: &str) -> Result<Vec<SnapshotDir>> {
    if !data_folder.is_dir() {
        return Err(CatalogError::DataPathNotFound(data_folder.to_path_buf()));
    }

    let mut snapshots = Vec::new();
    for entry in walkdir::WalkDir::new(data_folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|e| CatalogError::Io(e.into()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        match SnapshotDir::open(entry.path(), extension) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(CatalogError::InvalidSnapshotName(name)) => {
                warn!("Skipping folder {} (not a capture timestamp)", name);
            }
            Err(e) => return Err(e),
        }
    }

    snapshots.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(
        "Discovered {} snapshots in {}",
        snapshots.len(),
        data_folder.display()
    );
    Ok(snapshots)
}

/// Files directly inside `dir` with the given extension, sorted by name.
///
/// Fails on the first directory entry that cannot be read.
pub fn find_shard_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|e| CatalogError::Io(e.into()))?;
        let matches = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .map(|ext| ext == extension)
                .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

// ── Shard reading & validation ────────────────────────────────────────────────

/// Totals from a successful validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub shards: usize,
    pub records: usize,
}

/// Parse every line of every shard without keeping any record.
///
/// Fails on the first line that is not a complete record, so a snapshot is
/// either fully readable or rejected before any statistics are computed. A
/// snapshot without shard files is rejected too.
pub fn validate_snapshot(snapshot: &SnapshotDir) -> Result<ValidationReport> {
    if snapshot.shards().is_empty() {
        return Err(CatalogError::EmptySnapshot(snapshot.path().to_path_buf()));
    }
    let mut report = ValidationReport {
        shards: snapshot.shards().len(),
        records: 0,
    };
    snapshot.for_each_record(&mut |_| {
        report.records += 1;
        Ok(())
    })?;
    debug!(
        "Validated snapshot {}: {} records in {} shards",
        snapshot.name(),
        report.records,
        report.shards
    );
    Ok(report)
}

/// Stream the records of one shard into `f`. Returns the record count.
///
/// Blank lines are skipped. Any other line must parse as a [`Record`];
/// otherwise the whole read fails with the file and 1-based line number.
fn read_shard(path: &Path, f: &mut dyn FnMut(Record) -> Result<()>) -> Result<usize> {
    let file = std::fs::File::open(path).map_err(|source| CatalogError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);
    let mut records = 0usize;

    for (index, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|source| CatalogError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: Record =
            serde_json::from_str(trimmed).map_err(|e| CatalogError::MalformedRecord {
                path: path.to_path_buf(),
                line: index + 1,
                reason: e.to_string(),
            })?;
        records += 1;
        f(record)?;
    }

    debug!("Shard {}: {} records", path.display(), records);
    Ok(records)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_shard(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn record_line(id: &str) -> String {
        serde_json::json!({"id": id, "resources": []}).to_string()
    }

    fn collect_ids(source: &dyn RecordSource) -> Vec<String> {
        let mut ids = Vec::new();
        source
            .for_each_record(&mut |record| {
                ids.push(record.id);
                Ok(())
            })
            .unwrap();
        ids
    }

    // ── find_shard_files ──────────────────────────────────────────────────────

    #[test]
    fn test_find_shard_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_shard(dir.path(), "download_002000.ndjson", &["x"]);
        write_shard(dir.path(), "download_000000.ndjson", &["x"]);
        write_shard(dir.path(), "notes.txt", &["x"]);
        write_shard(&dir.path().join("errors"), "error_000000.ndjson", &["x"]);

        let files = find_shard_files(dir.path(), "ndjson").unwrap();
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["download_000000.ndjson", "download_002000.ndjson"]);
    }

    // ── discover_snapshots ────────────────────────────────────────────────────

    #[test]
    fn test_discover_snapshots_sorted_and_skips_other_folders() {
        let root = TempDir::new().unwrap();
        for name in ["20250303T060000", "20250301T060000", "scratch", "20250302T060000"] {
            write_shard(&root.path().join(name), "a.ndjson", &[&record_line("x")]);
        }

        let snapshots = discover_snapshots(root.path(), "ndjson").unwrap();
        let names: Vec<&str> = snapshots.iter().map(|s| s.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["20250301T060000", "20250302T060000", "20250303T060000"]
        );
    }

    #[test]
    fn test_discover_snapshots_missing_root() {
        let err = discover_snapshots(Path::new("/tmp/does-not-exist-catalog-xyz"), "ndjson")
            .unwrap_err();
        assert!(matches!(err, CatalogError::DataPathNotFound(_)));
    }

    #[test]
    fn test_discover_snapshots_empty_root() {
        let root = TempDir::new().unwrap();
        assert!(discover_snapshots(root.path(), "ndjson").unwrap().is_empty());
    }

    // ── SnapshotDir ───────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_reads_shards_in_name_order() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20250301T060000");
        write_shard(&dir, "b.ndjson", &[&record_line("id3")]);
        write_shard(&dir, "a.ndjson", &[&record_line("id1"), &record_line("id2")]);

        let snapshot = SnapshotDir::open(&dir, "ndjson").unwrap();
        assert_eq!(collect_ids(&snapshot), vec!["id1", "id2", "id3"]);
    }

    #[test]
    fn test_snapshot_counts_fetch_error_files() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20250301T060000");
        write_shard(&dir, "a.ndjson", &[&record_line("id1")]);
        write_shard(&dir.join(ERRORS_DIR), "error_000000_001000.json", &["{}"]);
        write_shard(&dir.join(ERRORS_DIR), "error_001000_002000.json", &["{}"]);

        let snapshot = SnapshotDir::open(&dir, "ndjson").unwrap();
        assert_eq!(snapshot.fetch_error_files().unwrap(), 2);
    }

    #[test]
    fn test_find_shard_files_missing_dir_is_error() {
        let root = TempDir::new().unwrap();
        let result = find_shard_files(&root.path().join("gone"), "ndjson");
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }

    #[test]
    fn test_snapshot_open_rejects_bad_name() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("latest");
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            SnapshotDir::open(&dir, "ndjson"),
            Err(CatalogError::InvalidSnapshotName(_))
        ));
    }

    // ── validate_snapshot ─────────────────────────────────────────────────────

    #[test]
    fn test_validate_snapshot_rejects_folder_without_shards() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20250301T060000");
        write_shard(&dir, "page.json", &[&record_line("id1")]);

        let snapshot = SnapshotDir::open(&dir, "ndjson").unwrap();
        assert!(snapshot.shards().is_empty());
        assert!(matches!(
            validate_snapshot(&snapshot),
            Err(CatalogError::EmptySnapshot(path)) if path == dir
        ));
    }

    #[test]
    fn test_validate_snapshot_counts_records() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20250301T060000");
        write_shard(&dir, "a.ndjson", &[&record_line("id1"), "", &record_line("id2")]);
        write_shard(&dir, "b.ndjson", &[&record_line("id3")]);

        let snapshot = SnapshotDir::open(&dir, "ndjson").unwrap();
        let report = validate_snapshot(&snapshot).unwrap();
        assert_eq!(report, ValidationReport { shards: 2, records: 3 });
    }

    #[test]
    fn test_validate_snapshot_rejects_embedded_line_break() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20250301T060000");
        // A record whose title contained a raw newline, split across two lines.
        write_shard(
            &dir,
            "a.ndjson",
            &[&record_line("id1"), r#"{"id": "id2", "title": "first half"#, r#"second half"}"#],
        );

        let snapshot = SnapshotDir::open(&dir, "ndjson").unwrap();
        match validate_snapshot(&snapshot).unwrap_err() {
            CatalogError::MalformedRecord { path, line, .. } => {
                assert!(path.ends_with("a.ndjson"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_snapshot_rejects_record_without_id() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("20250301T060000");
        write_shard(&dir, "a.ndjson", &[r#"{"title": "no id"}"#]);

        let snapshot = SnapshotDir::open(&dir, "ndjson").unwrap();
        assert!(matches!(
            validate_snapshot(&snapshot),
            Err(CatalogError::MalformedRecord { line: 1, .. })
        ));
    }

    // ── MemorySnapshot ────────────────────────────────────────────────────────

    #[test]
    fn test_memory_snapshot_enumerates_in_order() {
        let snapshot = MemorySnapshot::new(
            "mem",
            vec![Record::new("b"), Record::new("a"), Record::new("b")],
        );
        assert_eq!(snapshot.label(), "mem");
        assert_eq!(collect_ids(&snapshot), vec!["b", "a", "b"]);
    }
}
