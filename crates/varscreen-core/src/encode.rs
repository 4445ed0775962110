//! Encoding of an imputed wide table into a numeric feature matrix.
//!
//! Discrete types are one-hot encoded with the first level (numeric-aware
//! order) dropped as the reference. Continuous types are z-scored with the
//! cohort mean and population standard deviation. Each encoded variable gets
//! an [`EncodingDescriptor`] so single answers can be encoded the same way at
//! scoring time.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, warn};
use varscreen_ingest::write_csv_table;
use varscreen_model::{
    EncodingCatalog, EncodingDescriptor, EncodingOptions, RawValue, VariableType, compare_keys,
};

use crate::error::{PipelineError, Result};
use crate::impute::infer_type;
use crate::merge::{WideColumn, WideTable};

/// Column name of the binary risk label.
pub const LABEL_COLUMN: &str = "risk_label";

/// Row-major encoded features plus everything needed to reuse the encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMatrix {
    subject_column: String,
    subjects: Vec<String>,
    outcome_name: String,
    outcome: Vec<f64>,
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
    catalog: EncodingCatalog,
    label_threshold: Option<f64>,
    labels: Option<Vec<u8>>,
}

impl EncodedMatrix {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
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

    pub fn catalog(&self) -> &EncodingCatalog {
        &self.catalog
    }

    /// Outcome cut-off used for the label, if labels were produced.
    pub fn label_threshold(&self) -> Option<f64> {
        self.label_threshold
    }

    pub fn labels(&self) -> Option<&[u8]> {
        self.labels.as_deref()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    /// One feature column, top to bottom.
    pub fn feature(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.feature_names.iter().position(|f| f == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.width() + 3);
        columns.push(Series::new(self.subject_column.as_str().into(), self.subjects.clone()).into());
        for (idx, name) in self.feature_names.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|row| row[idx]).collect();
            columns.push(Series::new(name.as_str().into(), values).into());
        }
        columns.push(Series::new(self.outcome_name.as_str().into(), self.outcome.clone()).into());
        if let Some(labels) = &self.labels {
            let labels: Vec<i32> = labels.iter().map(|&l| i32::from(l)).collect();
            columns.push(Series::new(LABEL_COLUMN.into(), labels).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self.to_dataframe()?;
        write_csv_table(&mut df, path)?;
        info!(
            path = %path.display(),
            rows = self.height(),
            features = self.width(),
            "Wrote encoded matrix"
        );
        Ok(())
    }
}

/// Distinct level keys in numeric-aware order.
pub fn sorted_levels(values: &[RawValue]) -> Vec<String> {
    let mut levels: Vec<String> = values
        .iter()
        .filter_map(RawValue::key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    levels.sort_by(|a, b| compare_keys(a, b));
    levels
}

/// Mean and population standard deviation of the numeric cells.
pub fn mean_and_std(values: &[RawValue]) -> Option<(f64, f64)> {
    let numbers: Vec<f64> = values.iter().filter_map(RawValue::as_number).collect();
    if numbers.is_empty() {
        return None;
    }
    let n = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / n;
    let variance = numbers.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Linear-interpolation quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Encode one column; returns the descriptor and its feature columns.
fn encode_column(column: &WideColumn, var_type: VariableType) -> Option<(EncodingDescriptor, Vec<Vec<f64>>)> {
    if var_type == VariableType::Continuous {
        let (mean, std_dev) = mean_and_std(&column.values)?;
        let values: Vec<f64> = column
            .values
            .iter()
            .map(|v| {
                v.as_number()
                    .map_or(0.0, |x| EncodingDescriptor::standardize(mean, std_dev, x))
            })
            .collect();
        return Some((EncodingDescriptor::Continuous { mean, std_dev }, vec![values]));
    }

    let levels = sorted_levels(&column.values);
    let (reference, indicators) = levels.split_first()?;
    let keys: Vec<Option<String>> = column.values.iter().map(RawValue::key).collect();
    let features: Vec<Vec<f64>> = indicators
        .iter()
        .map(|level| {
            keys.iter()
                .map(|key| if key.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();
    Some((
        EncodingDescriptor::Categorical {
            reference: reference.clone(),
            levels: indicators.to_vec(),
        },
        features,
    ))
}

/// Encode every usable column of an imputed table.
///
/// Columns absent from `types` are typed with the fallback heuristic.
pub fn encode(
    table: &WideTable,
    types: &BTreeMap<String, VariableType>,
    options: &EncodingOptions,
) -> Result<EncodedMatrix> {
    let height = table.height();
    let mut feature_names: Vec<String> = Vec::new();
    let mut feature_columns: Vec<Vec<f64>> = Vec::new();
    let mut catalog = EncodingCatalog::new();

    for column in table.columns() {
        let var_type = types
            .get(&column.name)
            .copied()
            .unwrap_or_else(|| infer_type(&column.values, options));
        if !var_type.is_usable() {
            warn!(variable = %column.name, var_type = %var_type, "column not encoded");
            continue;
        }
        if column.missing_count() > 0 {
            debug!(
                variable = %column.name,
                missing = column.missing_count(),
                "encoding column with missing cells"
            );
        }
        let Some((descriptor, features)) = encode_column(column, var_type) else {
            warn!(variable = %column.name, "column has no values to encode");
            continue;
        };
        let names = descriptor.feature_names(&column.name);
        debug!(variable = %column.name, var_type = %var_type, features = names.len(), "encoded column");
        feature_names.extend(names);
        feature_columns.extend(features);
        catalog.insert(column.name.clone(), descriptor);
    }

    let mut seen = BTreeSet::new();
    if let Some(duplicate) = feature_names.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(PipelineError::Shape {
            message: format!("encoded feature name '{duplicate}' is not unique"),
        });
    }

    let rows: Vec<Vec<f64>> = (0..height)
        .map(|row| feature_columns.iter().map(|column| column[row]).collect())
        .collect();

    let label_threshold = options
        .label_quantile
        .and_then(|q| quantile(table.outcome(), q));
    let labels = label_threshold.map(|threshold| {
        table
            .outcome()
            .iter()
            .map(|&y| u8::from(y >= threshold))
            .collect()
    });

    info!(
        rows = height,
        variables = catalog.len(),
        features = feature_names.len(),
        label_threshold,
        "encoding complete"
    );
    Ok(EncodedMatrix {
        subject_column: table.subject_column().to_string(),
        subjects: table.subjects().to_vec(),
        outcome_name: table.outcome_name().to_string(),
        outcome: table.outcome().to_vec(),
        feature_names,
        rows,
        catalog,
        label_threshold,
        labels,
    })
}
