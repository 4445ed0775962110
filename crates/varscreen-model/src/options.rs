//! Tunable thresholds for classification, screening and encoding.

use serde::{Deserialize, Serialize};

/// Thresholds used by the variable classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// A column is low-variance when its modal value exceeds this share.
    pub low_variance_ratio: f64,

    /// Numeric columns with more distinct values than this are continuous.
    pub max_discrete_levels: usize,

    /// Text columns with more distinct values than this are free text.
    pub max_text_levels: usize,

    /// Column names always classified as categorical.
    pub forced_categorical: Vec<String>,

    /// Name fragments (lowercase) that force a categorical type.
    pub forced_categorical_fragments: Vec<String>,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            low_variance_ratio: 0.95,
            max_discrete_levels: 10,
            max_text_levels: 10,
            forced_categorical: Vec::new(),
            forced_categorical_fragments: vec!["race".to_string(), "ethnicity".to_string()],
        }
    }
}

impl ClassifierOptions {
    pub fn with_low_variance_ratio(mut self, ratio: f64) -> Self {
        self.low_variance_ratio = ratio;
        self
    }

    pub fn with_forced_categorical(mut self, names: Vec<String>) -> Self {
        self.forced_categorical = names;
        self
    }

    /// True when `name` matches an exact override or a forced fragment.
    pub fn is_forced_categorical(&self, name: &str) -> bool {
        if self
            .forced_categorical
            .iter()
            .any(|forced| forced.eq_ignore_ascii_case(name))
        {
            return true;
        }
        let lower = name.to_lowercase();
        self.forced_categorical_fragments
            .iter()
            .any(|fragment| lower.contains(fragment.as_str()))
    }
}

/// Imputation rule for ordinal variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdinalImputation {
    /// Most frequent value, like other discrete types.
    #[default]
    Mode,
    /// Mean of valid values, like continuous types.
    Mean,
}

/// Options for the missing-value and encoding stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingOptions {
    pub ordinal_imputation: OrdinalImputation,

    /// Distinct-value cutoff used when a column has no declared type.
    pub fallback_discrete_levels: usize,

    /// Quantile of the outcome above which the risk label is 1.
    /// `None` disables the label column.
    pub label_quantile: Option<f64>,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            ordinal_imputation: OrdinalImputation::Mode,
            fallback_discrete_levels: 10,
            label_quantile: Some(0.75),
        }
    }
}

impl EncodingOptions {
    pub fn with_ordinal_imputation(mut self, rule: OrdinalImputation) -> Self {
        self.ordinal_imputation = rule;
        self
    }

    pub fn with_label_quantile(mut self, quantile: Option<f64>) -> Self {
        self.label_quantile = quantile;
        self
    }
}
