//! # Service configuration
//!
//! Settings are read from environment variables (a `.env` file is honoured by
//! the server binary before this module runs). Every value has a default so a
//! checkout with `model.json`, `pre_process_data/` and `meanings/` next to it
//! starts without any configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::encode::DEFAULT_JPEG_QUALITY;
use crate::error::{Error, Result};

pub const ENV_BIND: &str = "MEANING_LENS_BIND";
pub const ENV_MODEL: &str = "MEANING_LENS_MODEL";
pub const ENV_TAXONOMY: &str = "MEANING_LENS_TAXONOMY";
pub const ENV_DATASET_DIR: &str = "MEANING_LENS_DATASET_DIR";
pub const ENV_MEANINGS_DIR: &str = "MEANING_LENS_MEANINGS_DIR";
pub const ENV_JPEG_QUALITY: &str = "MEANING_LENS_JPEG_QUALITY";

/// Where the ordered label list comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum TaxonomySource {
    /// A versioned manifest file shipped with the model.
    Manifest(PathBuf),
    /// A dataset directory whose sorted entry names define the label order.
    DatasetDir(PathBuf),
}

/// Server start-up configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// Path to the dense-network model JSON.
    pub model_path: PathBuf,
    /// Source of the label taxonomy.
    pub taxonomy: TaxonomySource,
    /// Directory holding one `<label>.txt` per category.
    pub meanings_dir: PathBuf,
    /// JPEG quality for the diagnostic image (1-100).
    pub jpeg_quality: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:5000".to_string(),
            model_path: PathBuf::from("model.json"),
            taxonomy: TaxonomySource::DatasetDir(PathBuf::from("pre_process_data")),
            meanings_dir: PathBuf::from("meanings"),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// A manifest path in `MEANING_LENS_TAXONOMY` takes precedence over the
    /// dataset directory.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let taxonomy = match (non_empty(ENV_TAXONOMY), non_empty(ENV_DATASET_DIR)) {
            (Some(manifest), _) => TaxonomySource::Manifest(PathBuf::from(manifest)),
            (None, Some(dir)) => TaxonomySource::DatasetDir(PathBuf::from(dir)),
            (None, None) => defaults.taxonomy,
        };

        let jpeg_quality = match non_empty(ENV_JPEG_QUALITY) {
            Some(raw) => raw.trim().parse::<u8>().map_err(|_| {
                Error::Config(format!("{ENV_JPEG_QUALITY} must be an integer in 1..=100, got '{raw}'"))
            })?,
            None => defaults.jpeg_quality,
        };

        let config = ServerConfig {
            bind_addr: non_empty(ENV_BIND).unwrap_or(defaults.bind_addr),
            model_path: non_empty(ENV_MODEL).map(PathBuf::from).unwrap_or(defaults.model_path),
            taxonomy,
            meanings_dir: non_empty(ENV_MEANINGS_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.meanings_dir),
            jpeg_quality,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "JPEG quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if !self.bind_addr.contains(':') {
            return Err(Error::Config(format!(
                "bind address '{}' must be host:port",
                self.bind_addr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(
            config.taxonomy,
            TaxonomySource::DatasetDir(PathBuf::from("pre_process_data"))
        );
    }

    #[test]
    fn manifest_wins_over_dataset_dir() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (ENV_TAXONOMY, "labels.json"),
            (ENV_DATASET_DIR, "data"),
        ]))
        .unwrap();
        assert_eq!(config.taxonomy, TaxonomySource::Manifest(PathBuf::from("labels.json")));
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let err = ServerConfig::from_lookup(lookup_from(&[(ENV_JPEG_QUALITY, "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = ServerConfig::from_lookup(lookup_from(&[(ENV_JPEG_QUALITY, "high")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_bind_without_port() {
        let err = ServerConfig::from_lookup(lookup_from(&[(ENV_BIND, "localhost")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
