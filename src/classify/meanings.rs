use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use tracing::{info, warn};

use crate::classify::taxonomy::LabelTaxonomy;
use crate::error::{Error, Result};

/// Text returned for a label with no explanation on file.
pub const NO_MEANING: &str = "No meaning available.";

/// Explanatory text per label. Lookups never fail.
#[derive(Debug, Clone, Default)]
pub struct MeaningTable {
    entries: HashMap<String, String>,
}

impl MeaningTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, meaning: impl Into<String>) {
        self.entries.insert(label.into(), meaning.into());
    }

    /// Reads `<dir>/<label>.txt` for every taxonomy label, trimming
    /// surrounding whitespace. Missing files (or a missing directory) are
    /// logged and skipped; other read failures are errors.
    pub fn load_dir(dir: impl AsRef<Path>, taxonomy: &LabelTaxonomy) -> Result<Self> {
        let dir = dir.as_ref();
        let mut table = MeaningTable::new();
        for label in taxonomy.labels() {
            let path = dir.join(format!("{label}.txt"));
            match std::fs::read_to_string(&path) {
                Ok(text) => table.insert(label.clone(), text.trim()),
                Err(e) if e.kind() == IoErrorKind::NotFound => {
                    warn!(label = %label, path = %path.display(), "no meaning file");
                }
                Err(e) => return Err(Error::io(&path, e)),
            }
        }
        info!(dir = %dir.display(), loaded = table.len(), labels = taxonomy.len(), "loaded meanings");
        Ok(table)
    }

    /// Meaning for `label`, or [`NO_MEANING`].
    pub fn lookup(&self, label: &str) -> &str {
        self.entries.get(label).map_or(NO_MEANING, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_label_returns_sentinel() {
        let table = MeaningTable::new();
        assert_eq!(table.lookup("anything"), "No meaning available.");
    }

    #[test]
    fn loads_trimmed_text_and_tolerates_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stop.txt"), "\n  Come to a full stop.  \n").unwrap();
        let taxonomy = LabelTaxonomy::new(vec!["stop".into(), "yield".into()]).unwrap();

        let table = MeaningTable::load_dir(dir.path(), &taxonomy).unwrap();
        assert_eq!(table.lookup("stop"), "Come to a full stop.");
        assert_eq!(table.lookup("yield"), NO_MEANING);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn missing_directory_is_not_fatal() {
        let taxonomy = LabelTaxonomy::new(vec!["a".into()]).unwrap();
        let table = MeaningTable::load_dir("/no/such/meanings/dir", &taxonomy).unwrap();
        assert!(table.is_empty());
    }
}
