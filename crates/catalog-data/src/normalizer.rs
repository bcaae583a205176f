//! Record deduplication and field extraction.
//!
//! A capture can observe the same dataset twice when the catalog changes
//! while pages are being fetched. Deduplication keeps the first record seen
//! for each identifier, in snapshot enumeration order (shards sorted by file
//! name, then line order), so reruns over the same folder keep the same
//! version of every duplicated record.

use std::collections::HashSet;

use catalog_core::models::{Record, PUBLISHER_HIERARCHY_KEY};
use serde_json::Value;
use tracing::warn;

// ── Normalizer ────────────────────────────────────────────────────────────────

/// Streaming first-encountered-wins deduplicator.
#[derive(Debug, Default)]
pub struct Normalizer {
    seen: HashSet<String>,
    duplicates: usize,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `record` if its identifier has not been seen yet.
    ///
    /// Admitted records get their `publisher_hierarchy` extracted. Returns
    /// `None` for a duplicate, which is only counted.
    pub fn admit(&mut self, mut record: Record) -> Option<Record> {
        if self.seen.contains(&record.id) {
            self.duplicates += 1;
            return None;
        }
        self.seen.insert(record.id.clone());
        extract_publisher_hierarchy(&mut record);
        Some(record)
    }

    /// Records dropped as duplicates so far.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Distinct identifiers admitted so far.
    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }
}

/// Copy the value of the `publisher_hierarchy` extra to the top-level field.
///
/// String values are copied verbatim; any other JSON value is stored as its
/// compact JSON text. Records without the extra are left untouched.
pub fn extract_publisher_hierarchy(record: &mut Record) {
    let hierarchy = match record.extra(PUBLISHER_HIERARCHY_KEY) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return,
    };
    record.publisher_hierarchy = Some(hierarchy);
}

// ── In-memory normalization ───────────────────────────────────────────────────

/// A snapshot after deduplication: identifiers are unique.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSnapshot {
    records: Vec<Record>,
    duplicates_removed: usize,
}

impl NormalizedSnapshot {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates_removed
    }
}

/// Deduplicate `records` in iteration order.
pub fn normalize(records: impl IntoIterator<Item = Record>) -> NormalizedSnapshot {
    let mut normalizer = Normalizer::new();
    let records: Vec<Record> = records
        .into_iter()
        .filter_map(|record| normalizer.admit(record))
        .collect();

    if normalizer.duplicates() > 0 {
        warn!("de-duped {} records", normalizer.duplicates());
    }

    NormalizedSnapshot {
        records,
        duplicates_removed: normalizer.duplicates(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
