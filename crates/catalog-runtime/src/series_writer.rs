//! Web-facing artifact of the folded series.
//!
//! Layout under the web data folder:
//!
//! ```text
//! organizations.json          every organization plus the global series
//! organizations/<stem>.json   one organization per file
//! ```
//!
//! Both files are rewritten on every run; they are derived from the daily
//! statistics and can always be regenerated. Organization files left over
//! from an earlier run are removed once the new ones are in place.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use catalog_core::error::{CatalogError, Result};
use catalog_core::models::Organization;
use catalog_core::time_utils::to_iso_string;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::accumulator::{CatalogSeries, OrganizationTimeSeries, SeriesPoint};
use crate::store::write_json_atomic;

pub const SERIES_FILE: &str = "organizations.json";
pub const ORGANIZATIONS_DIR: &str = "organizations";

fn unsafe_stem_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("regex is valid"))
}

/// File stem for an organization id: anything outside `[A-Za-z0-9_-]`
/// becomes `_`, so ids made only of those characters map to themselves.
/// The mapping is not injective (`a.b` and `a_b` share a stem);
/// [`SeriesWriter::write`] refuses such a pair.
pub fn file_stem(organization_id: &str) -> String {
    let stem = unsafe_stem_chars().replace_all(organization_id, "_");
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem.into_owned()
    }
}

/// `date → value` view keyed by ISO timestamps, as charted by the dashboard.
fn date_map(
    points: &[SeriesPoint],
    value: impl Fn(&SeriesPoint) -> u64,
) -> BTreeMap<String, u64> {
    points
        .iter()
        .map(|p| (to_iso_string(p.date), value(p)))
        .collect()
}

// ── Documents ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OrganizationDocument<'a> {
    #[serde(flatten)]
    organization: &'a Organization,
    catalog_entry_counts: BTreeMap<String, u64>,
    resource_entry_counts: BTreeMap<String, u64>,
    entry_count_delta: Option<i64>,
    points: &'a [SeriesPoint],
}

impl<'a> OrganizationDocument<'a> {
    fn new(series: &'a OrganizationTimeSeries) -> Self {
        Self {
            organization: &series.organization,
            catalog_entry_counts: date_map(&series.points, |p| p.count),
            resource_entry_counts: date_map(&series.points, |p| p.resource_count),
            entry_count_delta: series.entry_count_delta(),
            points: &series.points,
        }
    }
}

#[derive(Serialize)]
struct SeriesDocument<'a> {
    last_updated: Option<String>,
    catalog_daily_statistics: BTreeMap<String, u64>,
    resource_daily_statistics: BTreeMap<String, u64>,
    global: &'a [SeriesPoint],
    organizations: Vec<OrganizationDocument<'a>>,
}

// ── SeriesWriter ──────────────────────────────────────────────────────────────

/// What a [`SeriesWriter::write`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesWriteReport {
    pub series_file: PathBuf,
    pub organization_files: usize,
}

#[derive(Debug, Clone)]
pub struct SeriesWriter {
    root: PathBuf,
}

impl SeriesWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn series_path(&self) -> PathBuf {
        self.root.join(SERIES_FILE)
    }

    pub fn organizations_dir(&self) -> PathBuf {
        self.root.join(ORGANIZATIONS_DIR)
    }

    pub fn organization_path(&self, organization_id: &str) -> PathBuf {
        self.organizations_dir()
            .join(format!("{}.json", file_stem(organization_id)))
    }

    /// Write the series file and one file per organization, then remove
    /// organization files that no longer belong to the series.
    ///
    /// Nothing is written when two organizations share a file stem.
    pub fn write(&self, series: &CatalogSeries) -> Result<SeriesWriteReport> {
        let stems = stem_owners(series)?;

        let global = &series.global.points;
        let document = SeriesDocument {
            last_updated: series.last_updated.map(to_iso_string),
            catalog_daily_statistics: date_map(global, |p| p.count),
            resource_daily_statistics: date_map(global, |p| p.resource_count),
            global,
            organizations: series
                .organizations
                .iter()
                .map(OrganizationDocument::new)
                .collect(),
        };

        let series_file = self.series_path();
        write_json_atomic(&series_file, &document)?;

        for organization in &document.organizations {
            let path = self.organization_path(&organization.organization.id);
            write_json_atomic(&path, organization)?;
        }
        let removed = self.remove_stale_organization_files(&stems)?;

        tracing::info!(
            path = %series_file.display(),
            organizations = document.organizations.len(),
            days = global.len(),
            removed,
            "series written"
        );
        Ok(SeriesWriteReport {
            series_file,
            organization_files: document.organizations.len(),
        })
    }

    /// Delete `organizations/*.json` files whose stem is not in `keep`.
    fn remove_stale_organization_files(&self, keep: &BTreeMap<String, &str>) -> Result<usize> {
        let dir = self.organizations_dir();
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| CatalogError::Io(e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().map_or(true, |ext| ext != "json")
            {
                continue;
            }
            let stale = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map_or(true, |stem| !keep.contains_key(stem));
            if stale {
                std::fs::remove_file(path).map_err(|source| CatalogError::FileWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "stale organization file removed");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Map every file stem to the organization id that owns it, failing when
/// two distinct ids share a stem.
fn stem_owners(series: &CatalogSeries) -> Result<BTreeMap<String, &str>> {
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for organization in &series.organizations {
        let id = organization.organization.id.as_str();
        let stem = file_stem(id);
        match owners.get(&stem) {
            Some(&first) if first != id => {
                return Err(CatalogError::FileStemCollision {
                    stem,
                    first: first.to_string(),
                    second: id.to_string(),
                });
            }
            _ => {
                owners.insert(stem, id);
            }
        }
    }
    Ok(owners)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::GlobalTimeSeries;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn point(day: u32, count: u64, net_change: Option<i64>) -> SeriesPoint {
        SeriesPoint {
            date: Utc.with_ymd_and_hms(2025, 3, day, 6, 0, 0).unwrap(),
            count,
            resource_count: count * 2,
            net_change,
            added: None,
            removed: None,
        }
    }

    fn sample() -> CatalogSeries {
        let mut usgs = Organization::new("usgs/gov", "Geological Survey");
        usgs.attributes.insert("name".into(), json!("usgs-gov"));
        usgs.attributes.insert("city".into(), json!("Reston"));
        CatalogSeries {
            last_updated: Some(Utc.with_ymd_and_hms(2025, 3, 2, 6, 0, 0).unwrap()),
            global: GlobalTimeSeries {
                points: vec![point(1, 10, None), point(2, 12, Some(2))],
            },
            organizations: vec![OrganizationTimeSeries {
                organization: usgs,
                points: vec![point(1, 4, None), point(2, 6, Some(2))],
            }],
        }
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("usgs-gov_01"), "usgs-gov_01");
        assert_eq!(file_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_stem("a b.c"), "a_b_c");
        assert_eq!(file_stem(""), "_");
    }

    #[test]
    fn test_write_series_document() {
        let dir = TempDir::new().unwrap();
        let writer = SeriesWriter::new(dir.path());
        let report = writer.write(&sample()).unwrap();
        assert_eq!(report.organization_files, 1);

        let doc = read(&report.series_file);
        assert_eq!(doc["last_updated"], "2025-03-02T06:00:00+00:00");
        assert_eq!(doc["catalog_daily_statistics"]["2025-03-01T06:00:00+00:00"], 10);
        assert_eq!(doc["resource_daily_statistics"]["2025-03-02T06:00:00+00:00"], 24);
        assert_eq!(doc["global"][1]["net_change"], 2);

        let org = &doc["organizations"][0];
        assert_eq!(org["id"], "usgs/gov");
        assert_eq!(org["name"], "usgs-gov");
        assert!(org.get("city").is_none());
        assert_eq!(org["catalog_entry_counts"]["2025-03-02T06:00:00+00:00"], 6);
        assert_eq!(org["entry_count_delta"], 2);
        assert_eq!(org["points"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_write_organization_files() {
        let dir = TempDir::new().unwrap();
        let writer = SeriesWriter::new(dir.path());
        writer.write(&sample()).unwrap();

        let path = writer.organization_path("usgs/gov");
        assert_eq!(path, dir.path().join("organizations").join("usgs_gov.json"));
        let org = read(&path);
        assert_eq!(org["title"], "Geological Survey");
        assert_eq!(org["resource_entry_counts"]["2025-03-01T06:00:00+00:00"], 8);
    }

    #[test]
    fn test_colliding_stems_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut series = sample();
        for id in ["a.b", "a_b"] {
            series.organizations.push(OrganizationTimeSeries {
                organization: Organization::new(id, id),
                points: vec![point(1, 1, None)],
            });
        }

        let writer = SeriesWriter::new(dir.path());
        let err = writer.write(&series).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::FileStemCollision { ref stem, ref first, ref second }
                if stem == "a_b" && first == "a.b" && second == "a_b"
        ));
        assert!(!writer.series_path().exists());
        assert!(!writer.organizations_dir().exists());
    }

    #[test]
    fn test_rewrite_removes_stale_organization_files() {
        let dir = TempDir::new().unwrap();
        let writer = SeriesWriter::new(dir.path());
        writer.write(&sample()).unwrap();
        let usgs = writer.organization_path("usgs/gov");
        assert!(usgs.exists());

        let mut series = sample();
        series.organizations[0].organization = Organization::new("noaa", "NOAA");
        let unrelated = writer.organizations_dir().join("notes.txt");
        std::fs::write(&unrelated, "keep").unwrap();

        writer.write(&series).unwrap();
        assert!(!usgs.exists());
        assert!(writer.organization_path("noaa").exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_rewrite_replaces_previous_series() {
        let dir = TempDir::new().unwrap();
        let writer = SeriesWriter::new(dir.path());
        writer.write(&sample()).unwrap();
        writer.write(&CatalogSeries::default()).unwrap();

        let doc = read(&writer.series_path());
        assert!(doc["last_updated"].is_null());
        assert_eq!(doc["organizations"], json!([]));
        assert!(!writer.organization_path("usgs/gov").exists());
    }
}
