//! Error types for meaning-lens.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the meaning-lens library.
///
/// Request-path variants (`InputMissing` through `Encoding`) are collapsed
/// into a single error response by the server; the remaining variants only
/// occur while the service context is being built at start-up.
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried no image part.
    #[error("No image provided")]
    InputMissing,

    /// The uploaded bytes are not a recognizable image.
    #[error("cannot identify image file: {0}")]
    Decode(#[source] image::ImageError),

    /// The classification oracle failed or produced an unusable vector.
    #[error("classification failed: {0}")]
    Oracle(String),

    /// The oracle's output length disagrees with the label taxonomy.
    #[error("oracle produces {actual} scores but the taxonomy lists {expected} labels")]
    TaxonomyMismatch { expected: usize, actual: usize },

    /// The diagnostic image could not be serialized.
    #[error("failed to encode diagnostic image: {0}")]
    Encoding(#[source] image::ImageError),

    /// A taxonomy manifest is malformed or violates its invariants.
    #[error("invalid taxonomy manifest: {0}")]
    Manifest(String),

    /// A model file could not be read or is structurally invalid.
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Configuration value missing or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem access failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of an [`Error`], kept distinct for logging and tests
/// even though the HTTP contract reports every non-client failure the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputMissing,
    Decode,
    Oracle,
    TaxonomyMismatch,
    Encoding,
    Startup,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputMissing => ErrorKind::InputMissing,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Oracle(_) => ErrorKind::Oracle,
            Error::TaxonomyMismatch { .. } => ErrorKind::TaxonomyMismatch,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Manifest(_) | Error::ModelLoad { .. } | Error::Config(_) | Error::Io { .. } => {
                ErrorKind::Startup
            }
        }
    }

    /// True when the failure is the caller's fault (maps to a 4xx status).
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::InputMissing
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

/// Result type alias using the library [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_input_is_a_client_error() {
        assert!(Error::InputMissing.is_client_error());
        assert!(!Error::Oracle("boom".into()).is_client_error());
        assert!(!Error::TaxonomyMismatch { expected: 3, actual: 2 }.is_client_error());
    }

    #[test]
    fn missing_input_message_matches_wire_text() {
        assert_eq!(Error::InputMissing.to_string(), "No image provided");
    }

    #[test]
    fn startup_variants_share_a_kind() {
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Startup);
        assert_eq!(Error::Manifest("x".into()).kind(), ErrorKind::Startup);
    }
}
