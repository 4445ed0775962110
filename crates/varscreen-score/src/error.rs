//! Error types for scoring artifacts and prediction.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScoreError {
    /// A persisted artifact needed for scoring does not exist.
    #[error("{what} not found: {path}")]
    MissingArtifact { what: &'static str, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    ArtifactParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The model was fitted against a different feature order.
    #[error("feature list digest mismatch: model expects {expected}, got {actual}")]
    FeatureDigestMismatch { expected: String, actual: String },

    #[error("model coefficient '{0}' is not in the feature list")]
    CoefficientNotInFeatures(String),

    #[error("expected {expected} feature values, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    /// Failure inside the scoring model itself.
    #[error("model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
