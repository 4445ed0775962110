//! Merging accepted variables into one wide table keyed by subject.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use tracing::{info, info_span, warn};
use varscreen_ingest::{SourceFrame, write_csv_table};
use varscreen_model::{RawValue, VariableType};

use crate::cohort::{BaselineRows, Cohort};
use crate::config::{SourceSpec, StudyConfig};
use crate::error::{PipelineError, Result};
use crate::registry::VariableRegistry;

/// One variable column of a wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct WideColumn {
    pub name: String,
    pub values: Vec<RawValue>,
}

impl WideColumn {
    pub fn new(name: impl Into<String>, values: Vec<RawValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    /// Every present cell is numeric.
    pub fn is_numeric(&self) -> bool {
        self.values
            .iter()
            .all(|v| v.is_missing() || v.as_number().is_some())
    }

    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.values.iter().map(RawValue::as_number).collect()
    }
}

/// One row per cohort subject, in cohort order.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    subject_column: String,
    subjects: Vec<String>,
    outcome_name: String,
    outcome: Vec<f64>,
    columns: Vec<WideColumn>,
}

impl WideTable {
    /// A table holding only the cohort's outcome.
    pub fn from_cohort(cohort: &Cohort, subject_column: impl Into<String>) -> Self {
        Self {
            subject_column: subject_column.into(),
            subjects: cohort.subjects().to_vec(),
            outcome_name: cohort.outcome_name().to_string(),
            outcome: cohort.outcomes().to_vec(),
            columns: Vec::new(),
        }
    }

    pub fn subject_column(&self) -> &str {
        &self.subject_column
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn outcome_name(&self) -> &str {
        &self.outcome_name
    }

    pub fn outcome(&self) -> &[f64] {
        &self.outcome
    }

    pub fn columns(&self) -> &[WideColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&WideColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == self.outcome_name || name == self.subject_column || self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn height(&self) -> usize {
        self.subjects.len()
    }

    /// Variable columns, excluding subject and outcome.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn push_column(&mut self, column: WideColumn) -> Result<()> {
        if column.values.len() != self.height() {
            return Err(PipelineError::Shape {
                message: format!(
                    "column '{}' has {} rows, table has {}",
                    column.name,
                    column.values.len(),
                    self.height()
                ),
            });
        }
        if self.has_column(&column.name) {
            return Err(PipelineError::Shape {
                message: format!("duplicate column '{}'", column.name),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Same subjects and outcome, new variable columns.
    pub fn with_columns(&self, columns: Vec<WideColumn>) -> Result<Self> {
        let mut table = self.clone_frame();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    fn clone_frame(&self) -> Self {
        Self {
            subject_column: self.subject_column.clone(),
            subjects: self.subjects.clone(),
            outcome_name: self.outcome_name.clone(),
            outcome: self.outcome.clone(),
            columns: Vec::new(),
        }
    }

    /// Rows with no missing cell in any variable column.
    pub fn complete_cases(&self) -> usize {
        (0..self.height())
            .filter(|&row| {
                self.columns
                    .iter()
                    .all(|column| !column.values[row].is_missing())
            })
            .count()
    }

    /// Numeric-only columns become `Float64`, others stay `String`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + 2);
        columns.push(Series::new(self.subject_column.as_str().into(), self.subjects.clone()).into());
        columns.push(Series::new(self.outcome_name.as_str().into(), self.outcome.clone()).into());
        for column in &self.columns {
            let name: PlSmallStr = column.name.as_str().into();
            let series = if column.is_numeric() {
                Series::new(name, column.numbers())
            } else {
                let text: Vec<Option<String>> =
                    column.values.iter().map(RawValue::key).collect();
                Series::new(name, text)
            };
            columns.push(series.into());
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self.to_dataframe()?;
        write_csv_table(&mut df, path)?;
        info!(
            path = %path.display(),
            rows = self.height(),
            columns = self.width(),
            "Wrote wide table"
        );
        Ok(())
    }

    /// Rebuild a table from a persisted merged CSV.
    pub fn from_frame(frame: &SourceFrame, subject_column: &str, outcome_name: &str) -> Result<Self> {
        for column in [subject_column, outcome_name] {
            if !frame.has_column(column) {
                return Err(PipelineError::MissingColumn {
                    column: column.to_string(),
                    file: frame.file_name().to_string(),
                });
            }
        }
        let subjects = frame
            .text_column(subject_column)?
            .into_iter()
            .enumerate()
            .map(|(row, subject)| {
                subject.ok_or_else(|| PipelineError::Shape {
                    message: format!("row {row} has no subject id"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let outcome = frame
            .column_values(outcome_name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.as_number().ok_or_else(|| PipelineError::Shape {
                    message: format!("row {row} has a non-numeric outcome"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut table = Self {
            subject_column: subject_column.to_string(),
            subjects,
            outcome_name: outcome_name.to_string(),
            outcome,
            columns: Vec::new(),
        };
        for name in frame.column_names() {
            if name == subject_column || name == outcome_name {
                continue;
            }
            let values = frame.column_values(&name)?;
            table.push_column(WideColumn::new(name, values))?;
        }
        Ok(table)
    }

    pub fn load(path: &Path, subject_column: &str, outcome_name: &str) -> Result<Self> {
        let frame = SourceFrame::load(path)?;
        Self::from_frame(&frame, subject_column, outcome_name)
    }
}

/// Where source files live and which columns identify rows.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    pub source: SourceSpec,
    pub domain_dirs: BTreeMap<String, PathBuf>,
}

impl SourceLayout {
    pub fn from_config(config: &StudyConfig) -> Self {
        Self {
            source: config.source.clone(),
            domain_dirs: config.domain_dirs(),
        }
    }
}

/// A file or variable the merge could not include.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSkip {
    pub domain: String,
    pub source_file: String,
    /// `None` when the whole file was skipped.
    pub variable: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: WideTable,
    /// Column name → type, using qualified names where they collided.
    pub column_types: BTreeMap<String, VariableType>,
    pub skipped: Vec<MergeSkip>,
}

/// Left-join every registry variable onto the cohort.
pub fn merge(cohort: &Cohort, registry: &VariableRegistry, layout: &SourceLayout) -> MergeOutcome {
    let start = Instant::now();
    let mut table = WideTable::from_cohort(cohort, layout.source.subject_column.clone());
    let mut column_types = BTreeMap::new();
    let mut skipped = Vec::new();

    for group in registry.by_source() {
        let span = info_span!("merge_file", domain = %group.domain, source_file = %group.source_file);
        let _guard = span.enter();

        let skip_file = |reason: String| MergeSkip {
            domain: group.domain.to_string(),
            source_file: group.source_file.to_string(),
            variable: None,
            reason,
        };

        let Some(dir) = layout.domain_dirs.get(group.domain) else {
            warn!("domain not configured");
            skipped.push(skip_file("domain not configured".to_string()));
            continue;
        };
        let loaded = SourceFrame::load(&dir.join(group.source_file))
            .map_err(PipelineError::from)
            .and_then(|frame| {
                BaselineRows::select(&frame, &layout.source, cohort).map(|rows| (frame, rows))
            });
        let (frame, rows) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(error = %err, "source file skipped");
                skipped.push(skip_file(err.to_string()));
                continue;
            }
        };

        let stem = frame.file_stem().to_string();
        let mut joined = 0usize;
        let mut seen_in_file = HashSet::new();
        for record in &group.records {
            let variable = record.variable.as_str();
            if !seen_in_file.insert(variable) {
                continue;
            }
            let values = match frame.column_values(variable) {
                Ok(values) => rows.align(cohort, &values),
                Err(err) => {
                    warn!(variable, error = %err, "variable skipped");
                    skipped.push(MergeSkip {
                        variable: Some(variable.to_string()),
                        ..skip_file(err.to_string())
                    });
                    continue;
                }
            };
            let name = if table.has_column(variable) {
                format!("{variable}.{stem}")
            } else {
                variable.to_string()
            };
            match table.push_column(WideColumn::new(name.clone(), values)) {
                Ok(()) => {
                    column_types.insert(name, record.var_type);
                    joined += 1;
                }
                Err(err) => {
                    warn!(variable, error = %err, "variable skipped");
                    skipped.push(MergeSkip {
                        variable: Some(variable.to_string()),
                        ..skip_file(err.to_string())
                    });
                }
            }
        }
        info!(
            cohort_rows = rows.len(),
            variables = joined,
            "merged file"
        );
    }

    info!(
        rows = table.height(),
        columns = table.width(),
        skipped = skipped.len(),
        duration_ms = start.elapsed().as_millis(),
        "merge complete"
    );
    MergeOutcome {
        table,
        column_types,
        skipped,
    }
}
