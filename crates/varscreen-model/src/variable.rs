//! Variable classification results and registry records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::value::format_numeric;

/// Semantic type assigned to a screened column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Binary,
    Ordinal,
    Categorical,
    Continuous,
    LowVariance,
    Unknown,
    Excluded,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Binary => "binary",
            VariableType::Ordinal => "ordinal",
            VariableType::Categorical => "categorical",
            VariableType::Continuous => "continuous",
            VariableType::LowVariance => "low_variance",
            VariableType::Unknown => "unknown",
            VariableType::Excluded => "excluded",
        }
    }

    /// Types that are one-hot encoded.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            VariableType::Binary | VariableType::Ordinal | VariableType::Categorical
        )
    }

    /// Types that may enter the merged table.
    pub fn is_usable(&self) -> bool {
        self.is_discrete() || *self == VariableType::Continuous
    }

    /// Display grouping used in summaries.
    pub fn category_label(&self) -> &'static str {
        match self {
            VariableType::Ordinal | VariableType::Continuous => "Numerical",
            _ => "Categorical",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "binary" => Ok(VariableType::Binary),
            "ordinal" => Ok(VariableType::Ordinal),
            "categorical" => Ok(VariableType::Categorical),
            "continuous" => Ok(VariableType::Continuous),
            "low_variance" => Ok(VariableType::LowVariance),
            "unknown" => Ok(VariableType::Unknown),
            "excluded" => Ok(VariableType::Excluded),
            other => Err(ModelError::UnknownVariableType(other.to_string())),
        }
    }
}

/// Inclusive numeric range of a column's valid values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            format_numeric(self.min),
            format_numeric(self.max)
        )
    }
}

/// Output of classifying a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub n_valid: usize,
    pub n_unique: usize,
    pub value_range: Option<ValueRange>,
    pub var_type: VariableType,
}

/// One accepted variable, identified by (domain, source file, column).
///
/// Records are created once per screening run and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub domain: String,
    #[serde(rename = "filename")]
    pub source_file: String,
    pub variable: String,
    pub n_valid: usize,
    pub n_total: usize,
    pub n_unique: usize,
    pub range_min: Option<f64>,
    pub range_max: Option<f64>,
    pub var_type: VariableType,
}

impl VariableRecord {
    pub fn new(
        domain: impl Into<String>,
        source_file: impl Into<String>,
        variable: impl Into<String>,
        n_total: usize,
        result: &ClassificationResult,
    ) -> Self {
        Self {
            domain: domain.into(),
            source_file: source_file.into(),
            variable: variable.into(),
            n_valid: result.n_valid,
            n_total,
            n_unique: result.n_unique,
            range_min: result.value_range.map(|range| range.min),
            range_max: result.value_range.map(|range| range.max),
            var_type: result.var_type,
        }
    }

    pub fn value_range(&self) -> Option<ValueRange> {
        match (self.range_min, self.range_max) {
            (Some(min), Some(max)) => Some(ValueRange { min, max }),
            _ => None,
        }
    }

    /// Valid responses as a fraction of the cohort.
    pub fn coverage(&self) -> f64 {
        if self.n_total == 0 {
            0.0
        } else {
            self.n_valid as f64 / self.n_total as f64
        }
    }
}
