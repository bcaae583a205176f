use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::{CatalogError, Result};

/// strftime pattern of snapshot folder names and artifact dates.
pub const SNAPSHOT_NAME_FORMAT: &str = "%Y%m%dT%H%M%S";

fn snapshot_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{8}T\d{6}$").expect("regex is valid"))
}

// ── SnapshotName ──────────────────────────────────────────────────────────────

/// Capture timestamp naming one snapshot, e.g. `20250301T060000` (UTC).
///
/// The fixed-width format makes string order and chronological order agree,
/// so snapshots can be sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotName {
    name: String,
    captured_at: DateTime<Utc>,
}

impl SnapshotName {
    /// Validate `name` as a capture timestamp.
    pub fn parse(name: &str) -> Result<Self> {
        if !snapshot_name_pattern().is_match(name) {
            return Err(CatalogError::InvalidSnapshotName(name.to_string()));
        }
        let naive = NaiveDateTime::parse_from_str(name, SNAPSHOT_NAME_FORMAT)
            .map_err(|_| CatalogError::InvalidSnapshotName(name.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            captured_at: naive.and_utc(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Format a UTC timestamp as ISO 8601 with an explicit `+00:00` offset, the
/// form the dashboard keys its series by.
pub fn to_iso_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

/// `serialize_with` adapter writing a timestamp via [`to_iso_string`].
pub fn serialize_iso<S: serde::Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso_string(*ts))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
