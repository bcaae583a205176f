//! Record and resource counts over one filtered snapshot.

use std::collections::{BTreeMap, HashSet};

use catalog_core::error::Result;
use catalog_core::models::{Organization, Record};
use catalog_core::statistics::{CatalogSummary, OrganizationCounts, SnapshotCounts};

use crate::filter::FilteredSnapshot;
use crate::plan::{CatalogPlan, PlanStats};

// ── OrganizationTally ─────────────────────────────────────────────────────────

/// Running counts for one organization.
#[derive(Debug, Clone)]
struct OrganizationTally {
    /// Metadata from the first record seen for the organization.
    organization: Organization,
    catalog_count: u64,
    resource_count: u64,
}

impl OrganizationTally {
    fn new(organization: &Organization) -> Self {
        Self {
            organization: organization.clone(),
            catalog_count: 0,
            resource_count: 0,
        }
    }

    fn add_record(&mut self, record: &Record) {
        self.catalog_count += 1;
        self.resource_count += record.resource_count();
    }
}

// ── SnapshotStatistics ────────────────────────────────────────────────────────

/// Everything the aggregator derives from one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotStatistics {
    pub counts: SnapshotCounts,
    pub summary: CatalogSummary,
}

// ── CatalogAggregator ─────────────────────────────────────────────────────────

/// Single-pass fold computing [`SnapshotStatistics`].
///
/// Absence policy: a record without an organization counts towards
/// `total_records`, `total_resources` and `unattributed_records` but towards
/// no organization entry; an absent resource list counts as zero resources;
/// absent publisher hierarchy, groups or tags contribute nothing to the
/// summary.
#[derive(Debug, Default)]
pub struct CatalogAggregator {
    organizations: BTreeMap<String, OrganizationTally>,
    total_records: u64,
    total_resources: u64,
    unattributed_records: u64,
    publishers: HashSet<String>,
    groups: HashSet<String>,
    tags: HashSet<String>,
}

impl CatalogAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one record. Records must already be deduplicated.
    pub fn add_record(&mut self, record: &Record) {
        self.total_records += 1;
        self.total_resources += record.resource_count();

        match &record.organization {
            Some(org) => self
                .organizations
                .entry(org.id.clone())
                .or_insert_with(|| OrganizationTally::new(org))
                .add_record(record),
            None => self.unattributed_records += 1,
        }

        if let Some(publisher) = &record.publisher_hierarchy {
            self.publishers.insert(publisher.clone());
        }
        for group in record.groups.iter().flatten() {
            if let Some(key) = group.key() {
                self.groups.insert(key);
            }
        }
        for tag in record.tags.iter().flatten() {
            if let Some(key) = tag.key() {
                self.tags.insert(key);
            }
        }
    }

    /// Finish the fold. Organization entries come out sorted by id.
    pub fn finish(self) -> SnapshotStatistics {
        let summary = CatalogSummary {
            organization_count: self.organizations.len() as u64,
            publisher_count: self.publishers.len() as u64,
            group_count: self.groups.len() as u64,
            tag_count: self.tags.len() as u64,
            unattributed_records: self.unattributed_records,
        };

        let organizations = self
            .organizations
            .into_values()
            .map(|tally| OrganizationCounts {
                organization: tally.organization,
                catalog_count: tally.catalog_count,
                resource_count: tally.resource_count,
            })
            .collect();

        SnapshotStatistics {
            counts: SnapshotCounts {
                total_records: self.total_records,
                total_resources: self.total_resources,
                organizations,
            },
            summary,
        }
    }

    /// Aggregate an in-memory filtered snapshot.
    pub fn aggregate(snapshot: &FilteredSnapshot) -> SnapshotStatistics {
        let mut aggregator = Self::new();
        for record in snapshot.records() {
            aggregator.add_record(record);
        }
        aggregator.finish()
    }

    /// Aggregate by streaming `plan`, without materializing the snapshot.
    ///
    /// The plan is deduplicated if it was not already.
    pub fn aggregate_plan(plan: &CatalogPlan<'_>) -> Result<(SnapshotStatistics, PlanStats)> {
        let mut aggregator = Self::new();
        let stats = plan.unique_by_id().for_each(|record| {
            aggregator.add_record(&record);
            Ok(())
        })?;
        Ok((aggregator.finish(), stats))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
