//! Lazy query plans over a snapshot.
//!
//! Building a plan never touches storage: [`CatalogPlan::scan`],
//! [`CatalogPlan::unique_by_id`], [`CatalogPlan::exclude_organizations`] and
//! [`CatalogPlan::anti_join`] only describe the query. Records are read when
//! one of the execute methods (`for_each`, `collect`, `collect_filtered`,
//! `collect_ids`, `count`) is called, and each execution streams the source
//! again. Only what an execute method returns is materialized.

use std::collections::HashSet;

use catalog_core::error::Result;
use catalog_core::exclusions::ExclusionSet;
use catalog_core::models::Record;
use tracing::debug;

use crate::filter::{FilteredSnapshot, OrganizationFilter};
use crate::normalizer::Normalizer;
use crate::reader::RecordSource;

/// Counters from one plan execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Records read from the source.
    pub scanned: usize,
    /// Records dropped as duplicate identifiers.
    pub duplicates: usize,
    /// Records dropped because their organization is excluded.
    pub excluded: usize,
    /// Records handed to the consumer.
    pub emitted: usize,
}

// ── CatalogPlan ───────────────────────────────────────────────────────────────

/// Scan → unique → exclude, evaluated on demand.
///
/// Deduplication always runs before exclusion, so the version of a record
/// that is kept does not depend on the exclusion list.
#[derive(Clone, Copy)]
pub struct CatalogPlan<'a> {
    source: &'a dyn RecordSource,
    unique: bool,
    exclusions: Option<&'a ExclusionSet>,
}

impl<'a> CatalogPlan<'a> {
    /// Plan reading every record of `source`, as is.
    pub fn scan(source: &'a dyn RecordSource) -> Self {
        Self {
            source,
            unique: false,
            exclusions: None,
        }
    }

    /// Keep the first record for each identifier.
    pub fn unique_by_id(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Drop records whose organization is in `exclusions`.
    pub fn exclude_organizations(mut self, exclusions: &'a ExclusionSet) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    /// Shorthand for `scan(source).unique_by_id().exclude_organizations(..)`.
    pub fn filtered(source: &'a dyn RecordSource, exclusions: &'a ExclusionSet) -> Self {
        Self::scan(source)
            .unique_by_id()
            .exclude_organizations(exclusions)
    }

    pub fn label(&self) -> &str {
        self.source.label()
    }

    /// Records of `self` whose identifier does not occur in `other`.
    pub fn anti_join(&self, other: &CatalogPlan<'a>) -> AntiJoin<'a> {
        AntiJoin {
            left: *self,
            right: *other,
        }
    }

    // ── Execution ─────────────────────────────────────────────────────────

    /// Execute the plan, handing each surviving record to `f`.
    pub fn for_each(&self, mut f: impl FnMut(Record) -> Result<()>) -> Result<PlanStats> {
        let mut normalizer = self.unique.then(Normalizer::new);
        let filter = self.exclusions.map(OrganizationFilter::new);
        let mut stats = PlanStats::default();

        self.source.for_each_record(&mut |record| {
            stats.scanned += 1;
            let record = match normalizer.as_mut() {
                Some(normalizer) => match normalizer.admit(record) {
                    Some(record) => record,
                    None => return Ok(()),
                },
                None => record,
            };
            if let Some(filter) = &filter {
                if !filter.retains(&record) {
                    stats.excluded += 1;
                    return Ok(());
                }
            }
            stats.emitted += 1;
            f(record)
        })?;

        stats.duplicates = normalizer.map_or(0, |n| n.duplicates());
        debug!(
            snapshot = self.label(),
            scanned = stats.scanned,
            duplicates = stats.duplicates,
            excluded = stats.excluded,
            emitted = stats.emitted,
            "plan executed"
        );
        Ok(stats)
    }

    /// Execute and keep every surviving record.
    pub fn collect(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        self.for_each(|record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Execute as a [`FilteredSnapshot`]. Deduplication is applied even if
    /// the plan did not ask for it.
    pub fn collect_filtered(&self) -> Result<FilteredSnapshot> {
        let records = self.unique_by_id().collect()?;
        Ok(FilteredSnapshot::from_filtered(records))
    }

    /// Execute keeping identifiers only.
    pub fn collect_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        self.for_each(|record| {
            ids.insert(record.id);
            Ok(())
        })?;
        Ok(ids)
    }

    /// Execute keeping only the number of surviving records.
    pub fn count(&self) -> Result<usize> {
        Ok(self.for_each(|_| Ok(()))?.emitted)
    }
}

// ── AntiJoin ──────────────────────────────────────────────────────────────────

/// Identifier anti-join of two plans, evaluated on demand.
///
/// Execution first streams `right` to build its identifier set, then streams
/// `left` and keeps records whose identifier is not in the set. Only the
/// identifier set and the result are held in memory.
#[derive(Clone, Copy)]
pub struct AntiJoin<'a> {
    left: CatalogPlan<'a>,
    right: CatalogPlan<'a>,
}

impl AntiJoin<'_> {
    pub fn collect(&self) -> Result<Vec<Record>> {
        let right_ids = self.right.collect_ids()?;
        let mut records = Vec::new();
        self.left.for_each(|record| {
            if !right_ids.contains(&record.id) {
                records.push(record);
            }
            Ok(())
        })?;
        Ok(records)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
