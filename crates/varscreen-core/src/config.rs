//! Study configuration loaded from TOML.
//!
//! Every field has a default, so a study file only needs to state what differs
//! from the canonical survey layout. Relative paths resolve against
//! `data_root`, which itself resolves against the directory holding the file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use varscreen_model::{ClassifierOptions, EncodingOptions, SentinelSet};

use crate::error::{PipelineError, Result};
use crate::rules::ScreeningRules;

/// Where the outcome comes from and how it is named downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortSpec {
    pub file: PathBuf,
    /// Follow-up event whose outcome defines the cohort.
    pub event: String,
    pub outcome_column: String,
    /// Column name of the outcome in merged and encoded tables.
    pub outcome_name: String,
}

impl Default for CohortSpec {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/core/mental-health/mh_p_cbcl.csv"),
            event: "3_year_follow_up_y_arm_1".to_string(),
            outcome_column: "cbcl_scr_dsm5_depress_r".to_string(),
            outcome_name: "3_yr_depress_score".to_string(),
        }
    }
}

/// Column conventions shared by every source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSpec {
    pub subject_column: String,
    pub event_column: String,
    /// Timepoint whose rows feed screening and merging.
    pub baseline_event: String,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            subject_column: "src_subject_id".to_string(),
            event_column: "eventname".to_string(),
            baseline_event: "baseline_year_1_arm_1".to_string(),
        }
    }
}

impl SourceSpec {
    pub fn identifiers(&self) -> [&str; 2] {
        [self.subject_column.as_str(), self.event_column.as_str()]
    }
}

/// One thematic directory of survey tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub name: String,
    pub path: PathBuf,
    /// Only files whose name contains this fragment are screened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_filter: Option<String>,
}

impl DomainSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            file_filter: None,
        }
    }

    pub fn with_file_filter(mut self, fragment: impl Into<String>) -> Self {
        self.file_filter = Some(fragment.into());
        self
    }
}

fn default_domains() -> Vec<DomainSpec> {
    [
        ("Mental Health", "data/core/mental-health"),
        ("Substance Use", "data/core/substance-use"),
        ("Physical Health", "data/core/physical-health"),
        ("Culture & Environment", "data/core/culture-environment"),
        ("ABCD General", "data/core/abcd-general"),
    ]
    .into_iter()
    .map(|(name, path)| DomainSpec::new(name, path).with_file_filter("_p_"))
    .collect()
}

/// Optional collinearity pruning between imputation and encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningSpec {
    pub enabled: bool,
    /// Pairs with |Spearman r| strictly above this lose one member.
    pub threshold: f64,
}

impl Default for PruningSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.9,
        }
    }
}

/// Artifact file names, resolved under `dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSpec {
    pub dir: PathBuf,
    pub registry: String,
    pub merged: String,
    pub encoded: String,
    pub features: String,
    pub catalog: String,
    pub correlations: String,
    /// Distinct values of low-cardinality variables.
    pub level_summary: String,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            registry: "variable_analysis_results.csv".to_string(),
            merged: "merged_variables.csv".to_string(),
            encoded: "encoded_features.csv".to_string(),
            features: "model_feature_names.json".to_string(),
            catalog: "encoding_catalog.json".to_string(),
            correlations: "target_correlations.csv".to_string(),
            level_summary: "categorical_variable_summary.csv".to_string(),
        }
    }
}

/// Complete description of one screening study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub data_root: PathBuf,
    pub cohort: CohortSpec,
    pub source: SourceSpec,
    pub domains: Vec<DomainSpec>,
    pub sentinels: SentinelSet,
    pub classifier: ClassifierOptions,
    pub screening: ScreeningRules,
    pub encoding: EncodingOptions,
    pub pruning: PruningSpec,
    pub output: OutputSpec,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            cohort: CohortSpec::default(),
            source: SourceSpec::default(),
            domains: default_domains(),
            sentinels: SentinelSet::default(),
            classifier: ClassifierOptions::default(),
            screening: ScreeningRules::default(),
            encoding: EncodingOptions::default(),
            pruning: PruningSpec::default(),
            output: OutputSpec::default(),
        }
    }
}

impl StudyConfig {
    /// Read and validate a study file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigText::Parse(source) => PipelineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            ConfigText::Invalid(err) => err,
        })?;
        if config.data_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.data_root = base.join(&config.data_root);
        }
        tracing::debug!(
            path = %path.display(),
            data_root = %config.data_root.display(),
            domains = config.domains.len(),
            "Loaded study config"
        );
        Ok(config)
    }

    fn from_toml_str(contents: &str) -> std::result::Result<Self, ConfigText> {
        let config: Self = toml::from_str(contents).map_err(ConfigText::Parse)?;
        config.validate().map_err(ConfigText::Invalid)?;
        Ok(config)
    }

    /// Replace the data root, e.g. from a `--data-root` flag.
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(PipelineError::InvalidConfig {
                    message: format!("{name} must be within [0, 1], got {value}"),
                })
            }
        };
        fraction("screening.coverage_threshold", self.screening.coverage_threshold)?;
        fraction("classifier.low_variance_ratio", self.classifier.low_variance_ratio)?;
        fraction("pruning.threshold", self.pruning.threshold)?;
        if let Some(quantile) = self.encoding.label_quantile {
            fraction("encoding.label_quantile", quantile)?;
        }
        if self.cohort.outcome_name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig {
                message: "cohort.outcome_name must not be empty".to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        for domain in &self.domains {
            if !seen.insert(domain.name.as_str()) {
                return Err(PipelineError::InvalidConfig {
                    message: format!("duplicate domain name: {}", domain.name),
                });
            }
        }
        Ok(())
    }

    /// Absolute paths stay as given; relative ones join `data_root`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_root.join(path)
        }
    }

    pub fn cohort_path(&self) -> PathBuf {
        self.resolve(&self.cohort.file)
    }

    /// Domain name → resolved directory.
    pub fn domain_dirs(&self) -> BTreeMap<String, PathBuf> {
        self.domains
            .iter()
            .map(|domain| (domain.name.clone(), self.resolve(&domain.path)))
            .collect()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir().join(file_name)
    }
}

enum ConfigText {
    Parse(toml::de::Error),
    Invalid(PipelineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> StudyConfig {
        match StudyConfig::from_toml_str(text) {
            Ok(config) => config,
            Err(_) => panic!("config should parse"),
        }
    }

    #[test]
    fn empty_file_uses_canonical_defaults() {
        let config = parse("");
        assert_eq!(config.cohort.outcome_name, "3_yr_depress_score");
        assert_eq!(config.domains.len(), 5);
        assert_eq!(config.screening.coverage_threshold, 0.75);
        assert_eq!(config.classifier.low_variance_ratio, 0.95);
        assert_eq!(config.pruning.threshold, 0.9);
        assert_eq!(config.sentinels.codes, vec![555.0, 777.0, 999.0]);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse(
            r#"
data_root = "/srv/survey"

[cohort]
event = "2_year_follow_up_y_arm_1"

[[domains]]
name = "Mental Health"
path = "core/mental-health"

[screening]
coverage_threshold = 0.5

[screening.denylist]
"mh_p_ksads.csv" = ["ksads_time"]

[sentinels]
branching_policy = "count_as_missing"
"#,
        );
        assert_eq!(config.cohort.event, "2_year_follow_up_y_arm_1");
        assert_eq!(config.cohort.outcome_column, "cbcl_scr_dsm5_depress_r");
        assert_eq!(config.domains.len(), 1);
        assert_eq!(config.domains[0].file_filter, None);
        assert_eq!(config.screening.coverage_threshold, 0.5);
        assert_eq!(config.screening.denylist.len(), 1);
        assert_eq!(
            config.domain_dirs()["Mental Health"],
            PathBuf::from("/srv/survey/core/mental-health")
        );
        assert_eq!(
            config.sentinels.branching_policy,
            varscreen_model::BranchingPolicy::CountAsMissing
        );
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let result = StudyConfig::from_toml_str("[screening]\ncoverage_threshold = 75\n");
        assert!(matches!(
            result,
            Err(ConfigText::Invalid(PipelineError::InvalidConfig { .. }))
        ));
    }
}
