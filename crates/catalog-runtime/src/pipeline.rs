//! Daily statistics over the snapshot history.
//!
//! The pipeline walks the capture folders oldest first with a window of two
//! (predecessor, current). For each date that has no artifact yet it
//! validates both snapshots, aggregates the current one and diffs it against
//! its predecessor, then persists the result through the
//! [`StatisticsStore`]. Artifacts are written strictly in date order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use catalog_core::error::Result;
use catalog_core::exclusions::ExclusionSet;
use catalog_core::statistics::{DailyStatistics, DeltaResult};
use catalog_data::aggregator::{CatalogAggregator, SnapshotStatistics};
use catalog_data::differencer::Differencer;
use catalog_data::plan::{CatalogPlan, PlanStats};
use catalog_data::reader::{discover_snapshots, validate_snapshot, SnapshotDir};

use crate::store::StatisticsStore;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Dates whose artifact was written by this run, oldest first.
    pub processed: Vec<String>,
    /// Dates skipped because their artifact already existed.
    pub skipped: usize,
}

// ── DailyStatisticsPipeline ───────────────────────────────────────────────────

pub struct DailyStatisticsPipeline {
    data_folder: PathBuf,
    shard_extension: String,
    exclusions: ExclusionSet,
    store: StatisticsStore,
}

impl DailyStatisticsPipeline {
    pub fn new(
        data_folder: impl Into<PathBuf>,
        shard_extension: impl Into<String>,
        exclusions: ExclusionSet,
        store: StatisticsStore,
    ) -> Self {
        Self {
            data_folder: data_folder.into(),
            shard_extension: shard_extension.into(),
            exclusions,
            store,
        }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn store(&self) -> &StatisticsStore {
        &self.store
    }

    /// Produce the artifact of every snapshot date that does not have one.
    pub fn run(&self) -> Result<PipelineReport> {
        let snapshots = discover_snapshots(&self.data_folder, &self.shard_extension)?;
        tracing::info!(
            snapshots = snapshots.len(),
            excluded_organizations = self.exclusions.len(),
            "daily statistics run starting"
        );
        if snapshots.is_empty() {
            tracing::warn!(
                "No snapshots found in {}; nothing to do",
                self.data_folder.display()
            );
        }

        let mut report = PipelineReport::default();
        let mut validated = HashSet::new();

        for (index, current) in snapshots.iter().enumerate() {
            if self.store.contains(current.name().as_str()) {
                tracing::debug!(snapshot = %current.name(), "artifact exists, skipping");
                report.skipped += 1;
                continue;
            }

            let previous = index.checked_sub(1).map(|i| &snapshots[i]);
            for snapshot in previous.into_iter().chain(Some(current)) {
                if validated.insert(snapshot.name().clone()) {
                    validate_snapshot(snapshot)?;
                }
            }

            let stats = self.process(previous, current)?;
            self.store.write(&stats)?;
            report.processed.push(stats.date);
        }

        tracing::info!(
            processed = report.processed.len(),
            skipped = report.skipped,
            "daily statistics run finished"
        );
        Ok(report)
    }

    /// Compute the artifact for `current`, diffed against `previous` when
    /// there is one. Snapshots are not validated here.
    pub fn process(
        &self,
        previous: Option<&SnapshotDir>,
        current: &SnapshotDir,
    ) -> Result<DailyStatistics> {
        let current_plan = CatalogPlan::filtered(current, &self.exclusions);
        let previous_plan = previous.map(|p| CatalogPlan::filtered(p, &self.exclusions));

        let (aggregated, deltas) = std::thread::scope(|scope| {
            let aggregation = scope.spawn(|| CatalogAggregator::aggregate_plan(&current_plan));
            let deltas = previous_plan
                .as_ref()
                .map(|older| Differencer::between_plans(older, &current_plan))
                .transpose();
            let aggregated = aggregation
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
            (aggregated, deltas)
        });
        let (statistics, plan_stats): (SnapshotStatistics, PlanStats) = aggregated?;
        let deltas: Option<DeltaResult> = deltas?;

        if plan_stats.duplicates > 0 {
            tracing::warn!(
                snapshot = %current.name(),
                "de-duped {} records",
                plan_stats.duplicates
            );
        }

        let fetch_error_files = current.fetch_error_files()?;
        if fetch_error_files > 0 {
            tracing::warn!(
                snapshot = %current.name(),
                fetch_error_files,
                "snapshot was captured with fetch errors"
            );
        }

        tracing::info!(
            snapshot = %current.name(),
            total_records = statistics.counts.total_records,
            total_resources = statistics.counts.total_resources,
            organizations = statistics.counts.organizations.len(),
            excluded = plan_stats.excluded,
            "catalog statistics computed"
        );

        let name = current.name().to_string();
        Ok(DailyStatistics {
            date: name.clone(),
            current_fileset: name,
            comparison_fileset: previous.map(|p| p.name().to_string()),
            counts: statistics.counts,
            summary: statistics.summary,
            fetch_error_files,
            deltas,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::error::CatalogError;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn record(id: &str, org: &str, resources: usize) -> Value {
        json!({
            "id": id,
            "title": format!("Dataset {id}"),
            "organization": {"id": org, "title": format!("Org {org}"), "city": "Springfield"},
            "resources": vec![json!({"url": "https://example.org"}); resources],
        })
    }

    fn write_shard(root: &Path, snapshot: &str, shard: &str, records: &[Value]) {
        let dir = root.join(snapshot);
        std::fs::create_dir_all(&dir).unwrap();
        let body: String = records.iter().map(|r| format!("{r}\n")).collect();
        std::fs::write(dir.join(shard), body).unwrap();
    }

    /// Day 1 = {id1:X/2, id2:X/1, id3:Y/0}, Day 2 = {id1:X/2, id4:Y/3}.
    fn scenario_a(root: &Path) {
        write_shard(
            root,
            "20250301T060000",
            "000.ndjson",
            &[record("id1", "X", 2), record("id2", "X", 1), record("id3", "Y", 0)],
        );
        write_shard(
            root,
            "20250302T060000",
            "000.ndjson",
            &[record("id1", "X", 2), record("id4", "Y", 3)],
        );
    }

    fn pipeline(data: &Path, stats: &Path, exclusions: ExclusionSet) -> DailyStatisticsPipeline {
        DailyStatisticsPipeline::new(data, "ndjson", exclusions, StatisticsStore::new(stats))
    }

    fn ids(records: &[catalog_core::models::Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    // ── Scenarios ─────────────────────────────────────────────────────────

    #[test]
    fn test_basic_diff_end_to_end() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        scenario_a(&data);
        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());

        let report = p.run().unwrap();
        assert_eq!(report.processed, vec!["20250301T060000", "20250302T060000"]);
        assert_eq!(report.skipped, 0);

        let day2 =
            StatisticsStore::load(&p.store().path_for("20250302T060000")).unwrap();
        assert_eq!(day2.counts.total_records, 2);
        assert_eq!(day2.counts.total_resources, 5);
        assert_eq!(day2.comparison_fileset.as_deref(), Some("20250301T060000"));
        let deltas = day2.deltas.unwrap();
        assert_eq!(ids(&deltas.added), vec!["id4"]);
        assert_eq!(ids(&deltas.removed), vec!["id2", "id3"]);
        assert_eq!(deltas.added[0].field("title"), Some(&json!("Dataset id4")));
    }

    #[test]
    fn test_exclusion_end_to_end() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        scenario_a(&data);
        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::new(["Y"]));
        p.run().unwrap();

        let day1 =
            StatisticsStore::load(&p.store().path_for("20250301T060000")).unwrap();
        assert_eq!(day1.counts.total_records, 2);
        assert!(day1.counts.organization("Y").is_none());

        let day2 =
            StatisticsStore::load(&p.store().path_for("20250302T060000")).unwrap();
        let deltas = day2.deltas.unwrap();
        assert!(deltas.added.is_empty());
        assert_eq!(ids(&deltas.removed), vec!["id2"]);
    }

    #[test]
    fn test_in_snapshot_duplicate_keeps_first() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let mut first = record("id1", "X", 1);
        first["title"] = json!("first");
        let mut second = record("id1", "X", 1);
        second["title"] = json!("second");
        write_shard(&data, "20250301T060000", "000.ndjson", &[first]);
        write_shard(&data, "20250301T060000", "001.ndjson", &[second]);

        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        let snapshots = discover_snapshots(&data, "ndjson").unwrap();
        let stats = p.process(None, &snapshots[0]).unwrap();
        assert_eq!(stats.counts.total_records, 1);

        let kept = CatalogPlan::scan(&snapshots[0]).unique_by_id().collect().unwrap();
        assert_eq!(kept[0].field("title"), Some(&json!("first")));
    }

    #[test]
    fn test_cold_start_has_no_delta() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        scenario_a(&data);
        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        p.run().unwrap();

        let raw = std::fs::read_to_string(p.store().path_for("20250301T060000")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert!(value["deltas"].is_null());
        assert!(value["comparison_fileset"].is_null());
    }

    // ── Reruns & failures ─────────────────────────────────────────────────

    #[test]
    fn test_rerun_skips_existing_artifacts() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        scenario_a(&data);
        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        p.run().unwrap();

        write_shard(&data, "20250303T060000", "000.ndjson", &[record("id1", "X", 2)]);
        let report = p.run().unwrap();
        assert_eq!(report.processed, vec!["20250303T060000"]);
        assert_eq!(report.skipped, 2);

        let day3 =
            StatisticsStore::load(&p.store().path_for("20250303T060000")).unwrap();
        assert_eq!(day3.comparison_fileset.as_deref(), Some("20250302T060000"));
        assert_eq!(ids(&day3.deltas.unwrap().removed), vec!["id4"]);
    }

    #[test]
    fn test_malformed_line_aborts_before_writing() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        write_shard(&data, "20250301T060000", "000.ndjson", &[record("id1", "X", 1)]);
        let broken = data.join("20250302T060000");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(
            broken.join("000.ndjson"),
            "{\"id\": \"id1\", \"title\": \"line\nbreak\"}\n",
        )
        .unwrap();

        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        let err = p.run().unwrap_err();
        assert!(matches!(err, CatalogError::MalformedRecord { line: 1, .. }));
        assert!(p.store().contains("20250301T060000"));
        assert!(!p.store().contains("20250302T060000"));
    }

    #[test]
    fn test_snapshot_without_shards_aborts_before_writing() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        write_shard(
            &data,
            "20250301T060000",
            "000.ndjson",
            &[record("id1", "X", 1), record("id2", "X", 1)],
        );
        std::fs::create_dir_all(data.join("20250302T060000")).unwrap();

        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        let err = p.run().unwrap_err();
        assert!(matches!(
            err,
            CatalogError::EmptySnapshot(path) if path.ends_with("20250302T060000")
        ));
        assert!(p.store().contains("20250301T060000"));
        assert!(!p.store().contains("20250302T060000"));
    }

    #[test]
    fn test_null_optional_fields_do_not_abort() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let shard = data.join("20250301T060000");
        std::fs::create_dir_all(&shard).unwrap();
        std::fs::write(
            shard.join("000.ndjson"),
            concat!(
                "{\"id\":\"id1\",\"organization\":{\"id\":\"X\",\"title\":null},\"resources\":[]}\n",
                "{\"id\":\"id2\",\"organization\":{\"id\":null},\"groups\":[{\"id\":null,\"name\":7}],",
                "\"extras\":[{\"key\":null,\"value\":null}]}\n",
            ),
        )
        .unwrap();

        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        assert_eq!(p.run().unwrap().processed, vec!["20250301T060000"]);

        let day1 =
            StatisticsStore::load(&p.store().path_for("20250301T060000")).unwrap();
        assert_eq!(day1.counts.total_records, 2);
        let x = day1.counts.organization("X").unwrap();
        assert_eq!(x.catalog_count, 1);
        assert_eq!(x.organization.title, "");
    }

    #[test]
    fn test_fetch_error_files_recorded() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        write_shard(&data, "20250301T060000", "000.ndjson", &[record("id1", "X", 1)]);
        let errors = data.join("20250301T060000").join("errors");
        std::fs::create_dir_all(&errors).unwrap();
        std::fs::write(errors.join("page_3.json"), "{}").unwrap();
        std::fs::write(errors.join("page_9.json"), "{}").unwrap();

        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        p.run().unwrap();
        let day1 =
            StatisticsStore::load(&p.store().path_for("20250301T060000")).unwrap();
        assert_eq!(day1.fetch_error_files, 2);
    }

    #[test]
    fn test_empty_data_folder() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let p = pipeline(&data, &dir.path().join("stats"), ExclusionSet::default());
        assert_eq!(p.run().unwrap(), PipelineReport::default());
    }

    #[test]
    fn test_missing_data_folder() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(
            &dir.path().join("absent"),
            &dir.path().join("stats"),
            ExclusionSet::default(),
        );
        assert!(matches!(p.run(), Err(CatalogError::DataPathNotFound(_))));
    }
}
