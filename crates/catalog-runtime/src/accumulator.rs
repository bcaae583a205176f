//! Fold of persisted daily statistics into per-organization and global
//! time series.
//!
//! [`TimeSeriesAccumulator`] carries the previous count of every
//! organization and of the catalog as a whole from one day to the next. Each
//! [`TimeSeriesAccumulator::fold`] step consumes the accumulator and returns
//! the updated one, so the only state crossing days is the value itself.

use std::collections::{BTreeMap, HashMap, HashSet};

use catalog_core::error::{CatalogError, Result};
use catalog_core::models::Organization;
use catalog_core::statistics::{DailyStatistics, DeltaResult};
use catalog_core::time_utils::{serialize_iso, SnapshotName};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::StatisticsStore;

// ── Series types ──────────────────────────────────────────────────────────────

/// One day of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    #[serde(serialize_with = "serialize_iso")]
    pub date: DateTime<Utc>,
    pub count: u64,
    pub resource_count: u64,
    /// Change against the previous retained count; `None` on a first
    /// appearance.
    pub net_change: Option<i64>,
    /// `None` when the day carries no delta.
    pub added: Option<u64>,
    pub removed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationTimeSeries {
    /// Display metadata from the latest day the organization appeared on.
    pub organization: Organization,
    pub points: Vec<SeriesPoint>,
}

impl OrganizationTimeSeries {
    /// Last count minus first count, `None` with fewer than two points.
    pub fn entry_count_delta(&self) -> Option<i64> {
        match self.points.as_slice() {
            [first, .., last] => Some(last.count as i64 - first.count as i64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalTimeSeries {
    pub points: Vec<SeriesPoint>,
}

/// Finished fold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSeries {
    /// Date of the latest folded day.
    pub last_updated: Option<DateTime<Utc>>,
    pub global: GlobalTimeSeries,
    /// Sorted by organization title, ties by id.
    pub organizations: Vec<OrganizationTimeSeries>,
}

// ── Delta split ───────────────────────────────────────────────────────────────

/// Added/removed record counts keyed by organization id.
#[derive(Debug, Default)]
struct DeltaCounts {
    added: HashMap<String, u64>,
    removed: HashMap<String, u64>,
}

impl DeltaCounts {
    fn split(deltas: &DeltaResult) -> Self {
        let mut counts = Self::default();
        for id in deltas.added.iter().filter_map(|r| r.organization_id()) {
            *counts.added.entry(id.to_string()).or_default() += 1;
        }
        for id in deltas.removed.iter().filter_map(|r| r.organization_id()) {
            *counts.removed.entry(id.to_string()).or_default() += 1;
        }
        counts
    }

    fn added(&self, organization_id: &str) -> u64 {
        self.added.get(organization_id).copied().unwrap_or(0)
    }

    fn removed(&self, organization_id: &str) -> u64 {
        self.removed.get(organization_id).copied().unwrap_or(0)
    }

    fn total_added(&self) -> u64 {
        self.added.values().sum()
    }

    fn total_removed(&self) -> u64 {
        self.removed.values().sum()
    }
}

fn net_change(current: u64, previous: Option<u64>) -> Option<i64> {
    previous.map(|previous| current as i64 - previous as i64)
}

// ── TimeSeriesAccumulator ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TimeSeriesAccumulator {
    last_date: Option<SnapshotName>,
    previous_total: Option<u64>,
    previous_by_organization: HashMap<String, u64>,
    global: Vec<SeriesPoint>,
    organizations: BTreeMap<String, OrganizationTimeSeries>,
}

impl TimeSeriesAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count retained for `organization_id` from its latest appearance.
    pub fn previous_count(&self, organization_id: &str) -> Option<u64> {
        self.previous_by_organization.get(organization_id).copied()
    }

    pub fn previous_total(&self) -> Option<u64> {
        self.previous_total
    }

    /// Fold one day into the series.
    ///
    /// # Errors
    /// [`CatalogError::SeriesOrder`] when `day` does not come strictly after
    /// the previously folded day, and [`CatalogError::InvalidSnapshotName`]
    /// when its date is not a capture timestamp.
    pub fn fold(mut self, day: &DailyStatistics) -> Result<Self> {
        let name = SnapshotName::parse(&day.date)?;
        if let Some(previous) = &self.last_date {
            if name <= *previous {
                return Err(CatalogError::SeriesOrder {
                    previous: previous.to_string(),
                    current: name.to_string(),
                });
            }
        }
        let date = name.captured_at();
        let deltas = day.deltas.as_ref().map(DeltaCounts::split);

        let total = day.counts.total_records;
        self.global.push(SeriesPoint {
            date,
            count: total,
            resource_count: day.counts.total_resources,
            net_change: net_change(total, self.previous_total),
            added: deltas.as_ref().map(DeltaCounts::total_added),
            removed: deltas.as_ref().map(DeltaCounts::total_removed),
        });
        self.previous_total = Some(total);

        let mut seen_today = HashSet::new();
        for entry in &day.counts.organizations {
            let id = entry.organization.id.as_str();
            if !seen_today.insert(id) {
                tracing::warn!(
                    organization = id,
                    date = %name,
                    "organization listed twice in one day, keeping the first entry"
                );
                continue;
            }

            let point = SeriesPoint {
                date,
                count: entry.catalog_count,
                resource_count: entry.resource_count,
                net_change: net_change(entry.catalog_count, self.previous_count(id)),
                added: deltas.as_ref().map(|d| d.added(id)),
                removed: deltas.as_ref().map(|d| d.removed(id)),
            };

            match self.organizations.get_mut(id) {
                Some(series) => {
                    series.organization = entry.organization.clone();
                    series.points.push(point);
                }
                None => {
                    self.organizations.insert(
                        id.to_string(),
                        OrganizationTimeSeries {
                            organization: entry.organization.clone(),
                            points: vec![point],
                        },
                    );
                }
            }
            self.previous_by_organization
                .insert(id.to_string(), entry.catalog_count);
        }

        tracing::debug!(
            date = %name,
            total_records = total,
            organizations = seen_today.len(),
            "day folded"
        );
        self.last_date = Some(name);
        Ok(self)
    }

    /// Fold a date-ordered sequence of days, stopping at the first error.
    pub fn fold_all<I>(self, days: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<DailyStatistics>>,
    {
        days.into_iter().try_fold(self, |acc, day| acc.fold(&day?))
    }

    /// Fold every artifact in `store`.
    pub fn fold_store(self, store: &StatisticsStore) -> Result<Self> {
        self.fold_all(store.load_all()?)
    }

    pub fn finish(self) -> CatalogSeries {
        let mut organizations: Vec<OrganizationTimeSeries> =
            self.organizations.into_values().collect();
        organizations.sort_by(|a, b| {
            a.organization
                .title
                .cmp(&b.organization.title)
                .then_with(|| a.organization.id.cmp(&b.organization.id))
        });

        CatalogSeries {
            last_updated: self.last_date.map(|name| name.captured_at()),
            global: GlobalTimeSeries {
                points: self.global,
            },
            organizations,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
