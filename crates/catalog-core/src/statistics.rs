//! Per-snapshot statistics persisted once per capture date.

use serde::{Deserialize, Serialize};

use crate::models::{Organization, Record};

/// Counts for one organization within one filtered snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationCounts {
    /// Display metadata, serialized inline (`id`, `title`, ...).
    #[serde(flatten)]
    pub organization: Organization,
    /// Number of records owned by the organization.
    pub catalog_count: u64,
    /// Sum of resource-list lengths over those records.
    pub resource_count: u64,
}

/// Global and per-organization counts for one filtered snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    /// Every record, including records without an organization.
    pub total_records: u64,
    /// Every record's resources, including records without an organization.
    pub total_resources: u64,
    /// One entry per organization, sorted by organization id.
    pub organizations: Vec<OrganizationCounts>,
}

impl SnapshotCounts {
    pub fn organization(&self, id: &str) -> Option<&OrganizationCounts> {
        self.organizations.iter().find(|o| o.organization.id == id)
    }
}

/// Distinct-value counts over one filtered snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub organization_count: u64,
    pub publisher_count: u64,
    pub group_count: u64,
    pub tag_count: u64,
    /// Records that cannot be attributed to any organization.
    pub unattributed_records: u64,
}

/// Records added and removed between two adjacent filtered snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    /// Present in the newer snapshot only (full records from the newer one).
    pub added: Vec<Record>,
    /// Present in the older snapshot only (full records from the older one).
    pub removed: Vec<Record>,
}

impl DeltaResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The persisted artifact for one snapshot date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatistics {
    /// Capture timestamp of the snapshot, `YYYYMMDDTHHMMSS`.
    pub date: String,
    /// Folder name of the snapshot these statistics describe.
    pub current_fileset: String,
    /// Folder name of the preceding snapshot, `None` for the first one.
    pub comparison_fileset: Option<String>,
    pub counts: SnapshotCounts,
    #[serde(default)]
    pub summary: CatalogSummary,
    /// Fetch-error files the fetcher left in the snapshot's `errors/` folder.
    #[serde(default)]
    pub fetch_error_files: usize,
    /// `None` for the earliest snapshot, which has nothing to compare with.
    pub deltas: Option<DeltaResult>,
}
