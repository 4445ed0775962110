//! A loaded source table with text-level column access.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use varscreen_model::RawValue;

use crate::error::{IngestError, Result};
use crate::reader::read_csv_table;

/// One survey table held in memory for the duration of a single stage step.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    path: PathBuf,
    file_name: String,
    df: DataFrame,
}

impl SourceFrame {
    /// Read `path` fully. The file handle is closed before this returns.
    pub fn load(path: &Path) -> Result<Self> {
        let df = read_csv_table(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            df,
        })
    }

    /// Wrap an in-memory frame.
    pub fn from_dataframe(file_name: impl Into<String>, df: DataFrame) -> Self {
        let file_name = file_name.into();
        Self {
            path: PathBuf::from(&file_name),
            file_name,
            df,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without its extension (`mh_p_cbcl.csv` → `mh_p_cbcl`).
    pub fn file_stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map_or(self.file_name.as_str(), |(stem, _)| stem)
    }

    pub fn data(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Column names in file order.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(PlSmallStr::to_string)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// Trimmed cell text; empty cells become `None`.
    pub fn text_column(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self
            .df
            .column(name)
            .map_err(|_| IngestError::ColumnNotFound {
                column: name.to_string(),
                file: self.file_name.clone(),
            })?;
        let str_col = column.cast(&DataType::String)?;
        let str_chunked = str_col.str()?;

        Ok(str_chunked
            .iter()
            .map(|opt_val| {
                opt_val
                    .map(str::trim)
                    .filter(|val| !val.is_empty())
                    .map(str::to_string)
            })
            .collect())
    }

    /// Parsed cells of one column in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<RawValue>> {
        Ok(self
            .text_column(name)?
            .into_iter()
            .map(|cell| cell.map_or(RawValue::Missing, |text| RawValue::parse(&text)))
            .collect())
    }
}
