//! Raw cell values and sentinel codes.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tokens treated as an absent cell, compared case-insensitively.
const MISSING_TOKENS: &[&str] = &["na", "nan", "null", "none"];

/// A single source cell after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum RawValue {
    Missing,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Parse a trimmed source cell. Numeric text becomes `Number`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('\u{feff}');
        if is_missing_token(trimmed) {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            Ok(_) => Self::Missing,
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Canonical text key: numbers lose trailing zeros (`1.0` → `"1"`).
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Number(value) => Some(format_numeric(*value)),
            Self::Text(text) => Some(text.clone()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(value) => write!(f, "{}", format_numeric(*value)),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Returns true for empty cells and the usual absent-value spellings.
pub fn is_missing_token(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || MISSING_TOKENS
            .iter()
            .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Formats a floating-point number as a string without trailing zeros after decimal.
///
/// Only trims trailing zeros if the number contains a decimal point, so
/// integer-valued floats like 40.0 are formatted as "40".
///
/// # Examples
///
/// ```
/// use varscreen_model::format_numeric;
///
/// assert_eq!(format_numeric(1.0), "1");
/// assert_eq!(format_numeric(1.50), "1.5");
/// assert_eq!(format_numeric(40.0), "40");
/// ```
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Orders category keys numerically when both parse as numbers, else lexically.
pub fn compare_keys(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.total_cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

/// Whether the branching-logic code counts toward a variable's valid count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchingPolicy {
    /// 888 is a present answer for coverage but not a statistic.
    #[default]
    CountAsValid,
    /// 888 is treated like every other sentinel.
    CountAsMissing,
}

/// How a value relates to the sentinel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    /// A real measurement.
    Real,
    /// Refused / not-administered / missing-coded.
    Invalid,
    /// Branching logic not applicable.
    Branching,
}

/// Numeric codes that never represent real measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelSet {
    pub codes: Vec<f64>,
    pub branching: Option<f64>,
    pub branching_policy: BranchingPolicy,
}

impl Default for SentinelSet {
    fn default() -> Self {
        Self {
            codes: vec![555.0, 777.0, 999.0],
            branching: Some(888.0),
            branching_policy: BranchingPolicy::default(),
        }
    }
}

impl SentinelSet {
    pub fn with_branching_policy(mut self, policy: BranchingPolicy) -> Self {
        self.branching_policy = policy;
        self
    }

    /// Classify a cell. Text is always real; missing is invalid.
    pub fn kind(&self, value: &RawValue) -> SentinelKind {
        match value {
            RawValue::Missing => SentinelKind::Invalid,
            RawValue::Text(_) => SentinelKind::Real,
            RawValue::Number(number) => {
                if self.codes.iter().any(|code| code == number) {
                    SentinelKind::Invalid
                } else if self.branching == Some(*number) {
                    SentinelKind::Branching
                } else {
                    SentinelKind::Real
                }
            }
        }
    }

    /// True for missing cells and every sentinel code, including branching.
    pub fn is_absent(&self, value: &RawValue) -> bool {
        self.kind(value) != SentinelKind::Real
    }

    /// True when the value counts toward a variable's valid count.
    pub fn counts_as_valid(&self, value: &RawValue) -> bool {
        match self.kind(value) {
            SentinelKind::Real => true,
            SentinelKind::Invalid => false,
            SentinelKind::Branching => self.branching_policy == BranchingPolicy::CountAsValid,
        }
    }

    /// Replace every sentinel with `Missing`.
    pub fn scrub(&self, value: &RawValue) -> RawValue {
        if self.is_absent(value) {
            RawValue::Missing
        } else {
            value.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cells() {
        assert_eq!(RawValue::parse(" 3 "), RawValue::Number(3.0));
        assert_eq!(RawValue::parse("NaN"), RawValue::Missing);
        assert_eq!(RawValue::parse(""), RawValue::Missing);
        assert_eq!(RawValue::parse("Yes"), RawValue::Text("Yes".to_string()));
    }

    #[test]
    fn branching_code_follows_policy() {
        let sentinels = SentinelSet::default();
        let branching = RawValue::Number(888.0);
        assert!(sentinels.counts_as_valid(&branching));
        assert!(sentinels.is_absent(&branching));

        let strict = sentinels.with_branching_policy(BranchingPolicy::CountAsMissing);
        assert!(!strict.counts_as_valid(&branching));
        assert!(!strict.counts_as_valid(&RawValue::Number(999.0)));
    }

    #[test]
    fn orders_numeric_keys_numerically() {
        let mut keys = vec!["10", "2", "b", "1", "a"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["1", "2", "10", "a", "b"]);
    }
}
