//! Error types for the screening pipeline.

use std::path::PathBuf;

use thiserror::Error;
use varscreen_ingest::IngestError;

/// Errors raised by pipeline stages.
///
/// `MissingSource` and the configuration variants are fatal for a run.
/// Everything else is usually caught per file or per variable and recorded
/// next to the stage output instead of aborting it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A source the whole run depends on is absent.
    #[error("missing required source {what}: {path}")]
    MissingSource { what: String, path: PathBuf },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A file lacks the subject or event column.
    #[error("column '{column}' not found in {file}")]
    MissingColumn { column: String, file: String },

    #[error("failed to access CSV artifact {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("table shape mismatch: {message}")]
    Shape { message: String },

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<polars::prelude::PolarsError> for PipelineError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Ingest(IngestError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
