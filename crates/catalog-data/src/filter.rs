//! Exclusion of records owned by excluded organizations.

use catalog_core::exclusions::ExclusionSet;
use catalog_core::models::Record;
use tracing::debug;

use crate::normalizer::NormalizedSnapshot;

/// Predicate dropping records whose organization is excluded.
///
/// Records without an organization are kept; they only drop out of the
/// per-organization aggregates later.
#[derive(Debug, Clone, Copy)]
pub struct OrganizationFilter<'a> {
    exclusions: &'a ExclusionSet,
}

impl<'a> OrganizationFilter<'a> {
    pub fn new(exclusions: &'a ExclusionSet) -> Self {
        Self { exclusions }
    }

    pub fn retains(&self, record: &Record) -> bool {
        match record.organization_id() {
            Some(id) => !self.exclusions.contains(id),
            None => true,
        }
    }
}

/// A deduplicated snapshot with excluded organizations removed.
///
/// Identifiers are unique and no record belongs to an excluded organization.
#[derive(Debug, Clone, Default)]
pub struct FilteredSnapshot {
    records: Vec<Record>,
}

impl FilteredSnapshot {
    /// Wrap records the caller has already deduplicated and filtered.
    pub(crate) fn from_filtered(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }
}

/// Remove the records of excluded organizations from a normalized snapshot.
pub fn filter(normalized: NormalizedSnapshot, exclusions: &ExclusionSet) -> FilteredSnapshot {
    let predicate = OrganizationFilter::new(exclusions);
    let before = normalized.records().len();
    let records: Vec<Record> = normalized
        .into_records()
        .into_iter()
        .filter(|record| predicate.retains(record))
        .collect();
    debug!("excluded {} records", before - records.len());
    FilteredSnapshot::from_filtered(records)
}
