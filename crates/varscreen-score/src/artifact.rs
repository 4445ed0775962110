//! JSON artifact persistence shared by the feature list, catalog and model.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, ScoreError};

/// Read a JSON artifact; a missing file is reported as `MissingArtifact`.
pub(crate) fn read_json<T: DeserializeOwned>(what: &'static str, path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(ScoreError::MissingArtifact {
            what,
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path).map_err(|source| ScoreError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&text).map_err(|source| ScoreError::ArtifactParse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(artifact = what, path = %path.display(), "loaded artifact");
    Ok(value)
}

/// Write a pretty-printed JSON artifact, creating parent directories.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let write_err = |source| ScoreError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|source| ScoreError::ArtifactParse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text + "\n").map_err(write_err)
}
