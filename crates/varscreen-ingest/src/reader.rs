//! CSV reading and writing through Polars.
//!
//! Survey tables are read with schema inference disabled so every column
//! arrives as text. Numeric interpretation happens later, cell by cell,
//! which keeps sentinel codes and free-text answers intact.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{IngestError, Result};

const BOM: char = '\u{feff}';

/// Reads a CSV file into a DataFrame with every column typed as `String`.
pub fn read_csv_table(path: &Path) -> Result<DataFrame> {
    let metadata = std::fs::metadata(path).map_err(|_| IngestError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    if !metadata.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if metadata.len() == 0 {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    strip_header_bom(&mut df)?;

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded CSV table"
    );

    Ok(df)
}

/// Writes a DataFrame as CSV, creating parent directories as needed.
pub fn write_csv_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IngestError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut file = File::create(path).map_err(|e| IngestError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| IngestError::CsvWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Wrote CSV table"
    );
    Ok(())
}

/// Excel exports often prefix the first header with a byte-order mark.
fn strip_header_bom(df: &mut DataFrame) -> Result<()> {
    let first = df
        .get_column_names()
        .first()
        .map(|name| name.to_string())
        .filter(|name| name.starts_with(BOM));
    if let Some(name) = first {
        let cleaned = name.trim_start_matches(BOM).to_string();
        df.rename(&name, cleaned.into())?;
    }
    Ok(())
}
