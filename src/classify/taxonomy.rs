//! # Label taxonomy
//!
//! The ordered label list is part of the model: position `i` names the
//! oracle's `i`-th score. It ships as a small versioned JSON manifest next to
//! the model and is checked against the oracle at start-up.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Manifest format understood by this build.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Ordered, immutable list of category names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTaxonomy {
    format_version: u32,
    labels: Vec<String>,
}

impl LabelTaxonomy {
    /// Builds a current-format taxonomy, rejecting empty or duplicate labels.
    pub fn new(labels: Vec<String>) -> Result<Self> {
        let taxonomy = LabelTaxonomy { format_version: MANIFEST_FORMAT_VERSION, labels };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(Error::Manifest(format!(
                "unsupported format_version {} (expected {MANIFEST_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.labels.is_empty() {
            return Err(Error::Manifest("label list is empty".into()));
        }
        let mut seen = HashSet::new();
        for label in &self.labels {
            if label.is_empty() {
                return Err(Error::Manifest("labels must be non-empty strings".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(Error::Manifest(format!("duplicate label '{label}'")));
            }
        }
        Ok(())
    }

    /// Reads and validates a manifest file.
    pub fn load_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let taxonomy: LabelTaxonomy = serde_json::from_str(&raw)
            .map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))?;
        taxonomy.validate()?;
        info!(path = %path.display(), labels = taxonomy.len(), "loaded taxonomy manifest");
        Ok(taxonomy)
    }

    /// Writes the manifest as pretty-printed JSON.
    pub fn save_manifest(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Manifest(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    /// Derives the taxonomy from a dataset directory: every entry name,
    /// sorted lexicographically, in the order the model was trained with.
    pub fn from_dataset_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    return Err(Error::Manifest(format!("non UTF-8 entry {raw:?} in {}", dir.display())));
                }
            }
        }
        names.sort();
        info!(dir = %dir.display(), labels = names.len(), "derived taxonomy from dataset listing");
        LabelTaxonomy::new(names)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Fails with [`Error::TaxonomyMismatch`] unless the oracle emits exactly
    /// one score per label.
    pub fn ensure_matches(&self, oracle_outputs: usize) -> Result<()> {
        if oracle_outputs != self.labels.len() {
            return Err(Error::TaxonomyMismatch {
                expected: self.labels.len(),
                actual: oracle_outputs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dataset_listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["stop", "Yield", "crossing", "merge"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let taxonomy = LabelTaxonomy::from_dataset_dir(dir.path()).unwrap();
        assert_eq!(taxonomy.labels(), ["Yield", "crossing", "merge", "stop"]);
        assert_eq!(taxonomy.get(2), Some("merge"));
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert!(matches!(LabelTaxonomy::new(vec![]), Err(Error::Manifest(_))));
        assert!(matches!(LabelTaxonomy::new(labels(&["a", "b", "a"])), Err(Error::Manifest(_))));
    }

    #[test]
    fn manifest_file_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        let taxonomy = LabelTaxonomy::new(labels(&["zebra", "apple"])).unwrap();
        taxonomy.save_manifest(&path).unwrap();
        assert_eq!(LabelTaxonomy::load_manifest(&path).unwrap(), taxonomy);
    }

    #[test]
    fn unknown_manifest_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"format_version": 2, "labels": ["a"]}"#).unwrap();
        assert!(matches!(LabelTaxonomy::load_manifest(&path), Err(Error::Manifest(_))));
    }

    #[test]
    fn size_check_against_oracle() {
        let taxonomy = LabelTaxonomy::new(labels(&["a", "b", "c"])).unwrap();
        assert!(taxonomy.ensure_matches(3).is_ok());
        assert!(matches!(
            taxonomy.ensure_matches(4),
            Err(Error::TaxonomyMismatch { expected: 3, actual: 4 })
        ));
    }
}
