//! Per-variable encoding descriptors shared by training and scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How one variable's raw answer becomes encoded feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingDescriptor {
    /// Two-valued answer mapped to a fixed value per key.
    Binary { mapping: BTreeMap<String, f64> },
    /// Scale answer mapped to a fixed step value per key.
    Ordinal { mapping: BTreeMap<String, f64> },
    /// Z-scored against the cohort's mean and standard deviation.
    Continuous { mean: f64, std_dev: f64 },
    /// One indicator per non-reference level.
    Categorical {
        reference: String,
        levels: Vec<String>,
    },
}

impl EncodingDescriptor {
    /// Encoded column names produced for `variable`, in matrix order.
    pub fn feature_names(&self, variable: &str) -> Vec<String> {
        match self {
            EncodingDescriptor::Categorical { levels, .. } => levels
                .iter()
                .map(|level| indicator_name(variable, level))
                .collect(),
            _ => vec![variable.to_string()],
        }
    }

    /// Z-score a value; a zero spread collapses to the mean.
    pub fn standardize(mean: f64, std_dev: f64, value: f64) -> f64 {
        if std_dev > 0.0 {
            (value - mean) / std_dev
        } else {
            0.0
        }
    }
}

/// Column name for the indicator of `level` within `variable`.
pub fn indicator_name(variable: &str, level: &str) -> String {
    format!("{variable}_{level}")
}

/// Descriptors keyed by variable id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingCatalog {
    pub descriptors: BTreeMap<String, EncodingDescriptor>,
}

impl EncodingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: impl Into<String>, descriptor: EncodingDescriptor) {
        self.descriptors.insert(variable.into(), descriptor);
    }

    pub fn get(&self, variable: &str) -> Option<&EncodingDescriptor> {
        self.descriptors.get(variable)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EncodingDescriptor)> {
        self.descriptors.iter()
    }
}
