//! Organization exclusion list.
//!
//! Loaded once per run and applied uniformly to filtering and differencing.
//! Loading fails closed: a missing, unreadable or empty list is an error,
//! never an empty set.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::{CatalogError, Result};

/// Set of organization identifiers whose records are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: BTreeSet<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Load one identifier per line from `path`.
    ///
    /// Surrounding whitespace is trimmed; blank lines and lines starting with
    /// `#` are ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::ExclusionList {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let set = Self::parse(&content);
        if set.is_empty() {
            return Err(CatalogError::ExclusionList {
                path: path.to_path_buf(),
                reason: "no organization identifiers".to_string(),
            });
        }

        debug!(count = set.len(), "excluded organizations: {:?}", set.ids);
        Ok(set)
    }

    fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn contains(&self, organization_id: &str) -> bool {
        self.ids.contains(organization_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_trims_and_skips_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded_organizations.csv");
        std::fs::write(&path, "org-a\n  org-b  \r\n\n# retired publisher\norg-c\n").unwrap();

        let set = ExclusionSet::load(&path).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("org-a"));
        assert!(set.contains("org-b"));
        assert!(set.contains("org-c"));
        assert!(!set.contains("# retired publisher"));
    }

    #[test]
    fn test_load_missing_file_fails_closed() {
        let dir = TempDir::new().unwrap();
        let err = ExclusionSet::load(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, CatalogError::ExclusionList { .. }));
    }

    #[test]
    fn test_load_empty_file_fails_closed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("excluded_organizations.csv");
        std::fs::write(&path, "\n# nothing here\n").unwrap();

        let err = ExclusionSet::load(&path).unwrap_err();
        assert!(err.to_string().contains("no organization identifiers"));
    }

    #[test]
    fn test_new_deduplicates() {
        let set = ExclusionSet::new(["org-a", "org-a", "org-b"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["org-a", "org-b"]);
    }
}
