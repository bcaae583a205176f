//! Added/removed records between two adjacent snapshots.
//!
//! Both directions are identifier anti-joins: `added` is newer ▷ older and
//! `removed` is older ▷ newer. Each side is deduplicated before joining, so
//! the two results are disjoint by construction.

use std::collections::HashSet;

use catalog_core::error::Result;
use catalog_core::statistics::DeltaResult;
use tracing::info;

use crate::filter::FilteredSnapshot;
use crate::plan::CatalogPlan;

/// Stateless helper computing [`DeltaResult`]s.
pub struct Differencer;

impl Differencer {
    /// Delta between two filtered snapshots already held in memory.
    pub fn between(older: &FilteredSnapshot, newer: &FilteredSnapshot) -> DeltaResult {
        let older_ids: HashSet<&str> = older.ids().collect();
        let newer_ids: HashSet<&str> = newer.ids().collect();

        DeltaResult {
            added: newer
                .records()
                .iter()
                .filter(|r| !older_ids.contains(r.id.as_str()))
                .cloned()
                .collect(),
            removed: older
                .records()
                .iter()
                .filter(|r| !newer_ids.contains(r.id.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Delta between two lazily evaluated plans.
    ///
    /// Each snapshot is streamed twice (once for its identifiers, once for
    /// the join) and never held in full; memory is bounded by the two
    /// identifier sets plus the delta records.
    pub fn between_plans<'a>(older: &CatalogPlan<'a>, newer: &CatalogPlan<'a>) -> Result<DeltaResult> {
        let older = older.unique_by_id();
        let newer = newer.unique_by_id();

        let added = newer.anti_join(&older).collect()?;
        info!("rows added: {}", added.len());
        let removed = older.anti_join(&newer).collect()?;
        info!("rows removed: {}", removed.len());

        Ok(DeltaResult { added, removed })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
