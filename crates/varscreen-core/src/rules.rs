//! Structural exclusion rules applied before classification.
//!
//! Rules are evaluated cheapest first and the first match wins. Redundancy is
//! checked last because it is the only rule with state: the first column met
//! per redundancy category during a screening run is kept as that category's
//! representative and later matches are excluded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a column did not make it into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Subject or event column.
    Identifier,
    /// Listed in the per-file denylist.
    Denylisted,
    /// Name contains an excluded fragment such as `timestamp`.
    NamePattern,
    /// Name ends with a metadata suffix such as `_nm`.
    MetadataSuffix,
    /// Item-bank file column without the item marker.
    NotItemResponse,
    /// A later member of an already represented redundancy category.
    Redundant,
    /// Free text: non-numeric with too many distinct values.
    FreeText,
    /// Too few valid responses relative to the cohort.
    LowCoverage,
    LowVariance,
    UnknownType,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Denylisted => "denylisted",
            Self::NamePattern => "name_pattern",
            Self::MetadataSuffix => "metadata_suffix",
            Self::NotItemResponse => "not_item_response",
            Self::Redundant => "redundant",
            Self::FreeText => "free_text",
            Self::LowCoverage => "low_coverage",
            Self::LowVariance => "low_variance",
            Self::UnknownType => "unknown_type",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files with a large item bank where only raw item responses are eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemBankRule {
    pub files: Vec<String>,
    pub marker: String,
}

impl Default for ItemBankRule {
    fn default() -> Self {
        Self {
            files: vec!["mh_p_cbcl.csv".to_string(), "mh_p_asr.csv".to_string()],
            marker: "_q".to_string(),
        }
    }
}

/// Name fragments identifying one redundancy category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundancyCategory {
    pub name: String,
    pub patterns: Vec<String>,
    /// Extra fragment the name must also contain for the category to apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
}

impl RedundancyCategory {
    fn new(name: &str, patterns: &[&str], requires: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            requires: requires.map(str::to_string),
        }
    }

    /// `lower` must already be lowercase.
    fn matches(&self, lower: &str) -> bool {
        let hit = self
            .patterns
            .iter()
            .any(|pattern| lower.contains(pattern.as_str()));
        hit && self
            .requires
            .as_deref()
            .is_none_or(|required| lower.contains(required))
    }
}

fn default_redundancy() -> Vec<RedundancyCategory> {
    vec![
        RedundancyCategory::new("sex", &["sex", "gender", "male", "female"], None),
        RedundancyCategory::new("age", &["age", "birth", "dob", "date_of_birth"], None),
        RedundancyCategory::new("id", &["id", "subject", "participant", "key"], None),
        RedundancyCategory::new(
            "anthropometric",
            &["anthro", "height", "weight", "bmi", "calc"],
            Some("calc"),
        ),
    ]
}

fn default_denylist() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 4] = [
        ("su_y_plus.csv", &["pls1_sess_date_time"]),
        (
            "ph_y_sal_horm.csv",
            &[
                "hormone_sal_start_y",
                "hormone_sal_end_y",
                "hormone_sal_wake_y",
                "hormone_sal_freezer_y",
            ],
        ),
        ("ph_p_meds.csv", &["curr_time"]),
        ("ph_y_anthro.csv", &["anthroheightcalc", "anthroweightcalc"]),
    ];
    entries
        .into_iter()
        .map(|(file, columns)| {
            (
                file.to_string(),
                columns.iter().map(|c| (*c).to_string()).collect(),
            )
        })
        .collect()
}

/// Screening thresholds and exclusion lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningRules {
    /// Accepted variables need `n_valid / cohort size` strictly above this.
    pub coverage_threshold: f64,
    pub excluded_substrings: Vec<String>,
    pub excluded_suffixes: Vec<String>,
    /// File name → columns never screened in that file.
    pub denylist: BTreeMap<String, Vec<String>>,
    pub item_banks: ItemBankRule,
    pub redundancy: Vec<RedundancyCategory>,
}

impl Default for ScreeningRules {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.75,
            excluded_substrings: ["timestamp", "language", "lang", "duration"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            excluded_suffixes: vec!["_nm".to_string(), "_nt".to_string()],
            denylist: default_denylist(),
            item_banks: ItemBankRule::default(),
            redundancy: default_redundancy(),
        }
    }
}

impl ScreeningRules {
    /// Strict coverage gate.
    pub fn passes_coverage(&self, n_valid: usize, cohort_size: usize) -> bool {
        cohort_size > 0 && n_valid as f64 / cohort_size as f64 > self.coverage_threshold
    }

    /// Apply the stateless rules then the redundancy rule.
    ///
    /// `identifiers` are the subject and event column names. The tracker is
    /// only consulted here; representatives are claimed once a column is
    /// accepted.
    pub fn structural_exclusion(
        &self,
        file_name: &str,
        column: &str,
        identifiers: &[&str],
        tracker: &RedundancyTracker,
    ) -> Option<ExclusionReason> {
        if identifiers.contains(&column) {
            return Some(ExclusionReason::Identifier);
        }
        if self
            .denylist
            .get(file_name)
            .is_some_and(|denied| denied.iter().any(|name| name == column))
        {
            return Some(ExclusionReason::Denylisted);
        }
        let lower = column.to_lowercase();
        if self
            .excluded_substrings
            .iter()
            .any(|fragment| lower.contains(fragment.as_str()))
        {
            return Some(ExclusionReason::NamePattern);
        }
        if self
            .excluded_suffixes
            .iter()
            .any(|suffix| column.ends_with(suffix.as_str()))
        {
            return Some(ExclusionReason::MetadataSuffix);
        }
        if self.item_banks.files.iter().any(|f| f == file_name)
            && !column.contains(self.item_banks.marker.as_str())
        {
            return Some(ExclusionReason::NotItemResponse);
        }
        match tracker.check(self, column) {
            RedundancyVerdict::Redundant { .. } => Some(ExclusionReason::Redundant),
            RedundancyVerdict::Unrelated | RedundancyVerdict::Representative { .. } => None,
        }
    }

    /// First redundancy category whose patterns match `column`.
    pub fn redundancy_category(&self, column: &str) -> Option<&RedundancyCategory> {
        let lower = column.to_lowercase();
        self.redundancy.iter().find(|category| category.matches(&lower))
    }
}

/// Outcome of checking a column against the redundancy categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedundancyVerdict {
    Unrelated,
    /// First column of its category; kept.
    Representative { category: String },
    /// Category already has a representative.
    Redundant { category: String, kept: String },
}

/// Representatives chosen so far in one screening run.
#[derive(Debug, Clone, Default)]
pub struct RedundancyTracker {
    retained: BTreeMap<String, (String, String)>,
}

impl RedundancyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verdict for `column` given the representatives claimed so far.
    pub fn check(&self, rules: &ScreeningRules, column: &str) -> RedundancyVerdict {
        let Some(category) = rules.redundancy_category(column) else {
            return RedundancyVerdict::Unrelated;
        };
        match self.retained.get(&category.name) {
            Some((_, kept)) => RedundancyVerdict::Redundant {
                category: category.name.clone(),
                kept: kept.clone(),
            },
            None => RedundancyVerdict::Representative {
                category: category.name.clone(),
            },
        }
    }

    /// Record an accepted column as its category's representative.
    ///
    /// Returns the category name when `column` became the representative.
    pub fn claim(
        &mut self,
        rules: &ScreeningRules,
        file_name: &str,
        column: &str,
    ) -> Option<String> {
        let category = rules.redundancy_category(column)?;
        if self.retained.contains_key(&category.name) {
            return None;
        }
        self.retained.insert(
            category.name.clone(),
            (file_name.to_string(), column.to_string()),
        );
        Some(category.name.clone())
    }

    /// `(file, column)` retained for `category`, if any.
    pub fn representative(&self, category: &str) -> Option<(&str, &str)> {
        self.retained
            .get(category)
            .map(|(file, column)| (file.as_str(), column.as_str()))
    }
}
