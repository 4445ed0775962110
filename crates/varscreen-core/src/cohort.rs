//! Reference cohort selection.
//!
//! The cohort is every subject with a real numeric outcome at the follow-up
//! event. It is computed once per run and its size is the denominator of
//! every coverage ratio downstream.

use std::collections::HashMap;

use varscreen_ingest::SourceFrame;
use varscreen_model::{RawValue, SentinelSet};

use crate::config::{CohortSpec, SourceSpec, StudyConfig};
use crate::error::{PipelineError, Result};

/// Ordered, duplicate-free subjects with their outcome values.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    outcome_name: String,
    subjects: Vec<String>,
    outcomes: Vec<f64>,
    index: HashMap<String, usize>,
}

impl Cohort {
    /// Build from `(subject, outcome)` pairs; later duplicates are ignored.
    pub fn from_pairs(
        outcome_name: impl Into<String>,
        pairs: impl IntoIterator<Item = (String, f64)>,
    ) -> Self {
        let mut cohort = Self {
            outcome_name: outcome_name.into(),
            subjects: Vec::new(),
            outcomes: Vec::new(),
            index: HashMap::new(),
        };
        for (subject, outcome) in pairs {
            if cohort.index.contains_key(&subject) {
                continue;
            }
            cohort.index.insert(subject.clone(), cohort.subjects.len());
            cohort.subjects.push(subject);
            cohort.outcomes.push(outcome);
        }
        cohort
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn outcome_name(&self) -> &str {
        &self.outcome_name
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn outcomes(&self) -> &[f64] {
        &self.outcomes
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.index.contains_key(subject)
    }

    /// Row of `subject` in cohort order.
    pub fn position(&self, subject: &str) -> Option<usize> {
        self.index.get(subject).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.subjects
            .iter()
            .map(String::as_str)
            .zip(self.outcomes.iter().copied())
    }

    /// `n_valid` as a fraction of the cohort (0 for an empty cohort).
    pub fn coverage(&self, n_valid: usize) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            n_valid as f64 / self.len() as f64
        }
    }
}

/// Select the cohort from an already loaded outcome table.
pub fn select_cohort(
    frame: &SourceFrame,
    spec: &CohortSpec,
    source: &SourceSpec,
    sentinels: &SentinelSet,
) -> Result<Cohort> {
    let missing = |column: &str| PipelineError::MissingSource {
        what: format!("column '{column}'"),
        path: frame.path().to_path_buf(),
    };
    for column in [
        &source.subject_column,
        &source.event_column,
        &spec.outcome_column,
    ] {
        if !frame.has_column(column) {
            return Err(missing(column));
        }
    }

    let subjects = frame.text_column(&source.subject_column)?;
    let events = frame.text_column(&source.event_column)?;
    let outcomes = frame.column_values(&spec.outcome_column)?;

    let mut event_rows = 0usize;
    let pairs: Vec<(String, f64)> = subjects
        .into_iter()
        .zip(events)
        .zip(outcomes)
        .filter_map(|((subject, event), outcome)| {
            if event.as_deref() != Some(spec.event.as_str()) {
                return None;
            }
            event_rows += 1;
            let subject = subject?;
            match sentinels.scrub(&outcome) {
                RawValue::Number(value) => Some((subject, value)),
                _ => None,
            }
        })
        .collect();

    let cohort = Cohort::from_pairs(spec.outcome_name.clone(), pairs);
    tracing::info!(
        source_file = %frame.file_name(),
        event = %spec.event,
        event_rows,
        cohort_size = cohort.len(),
        "Selected reference cohort"
    );
    Ok(cohort)
}

/// Load the outcome table named by the config and select the cohort.
pub fn load_cohort(config: &StudyConfig) -> Result<Cohort> {
    let path = config.cohort_path();
    if !path.is_file() {
        return Err(PipelineError::MissingSource {
            what: "outcome table".to_string(),
            path,
        });
    }
    let frame = SourceFrame::load(&path)?;
    select_cohort(&frame, &config.cohort, &config.source, &config.sentinels)
}

/// Rows of a source table at the baseline event that belong to the cohort.
///
/// Only the first row per subject is kept.
#[derive(Debug, Clone, Default)]
pub struct BaselineRows {
    rows: Vec<usize>,
    by_subject: HashMap<String, usize>,
}

impl BaselineRows {
    pub fn select(frame: &SourceFrame, source: &SourceSpec, cohort: &Cohort) -> Result<Self> {
        for column in [&source.subject_column, &source.event_column] {
            if !frame.has_column(column) {
                return Err(PipelineError::MissingColumn {
                    column: column.clone(),
                    file: frame.file_name().to_string(),
                });
            }
        }
        let subjects = frame.text_column(&source.subject_column)?;
        let events = frame.text_column(&source.event_column)?;

        let mut selected = Self::default();
        for (row, (subject, event)) in subjects.into_iter().zip(events).enumerate() {
            if event.as_deref() != Some(source.baseline_event.as_str()) {
                continue;
            }
            let Some(subject) = subject else { continue };
            if !cohort.contains(&subject) || selected.by_subject.contains_key(&subject) {
                continue;
            }
            selected.by_subject.insert(subject, row);
            selected.rows.push(row);
        }
        Ok(selected)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Selected row indices in file order.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn row_of(&self, subject: &str) -> Option<usize> {
        self.by_subject.get(subject).copied()
    }

    /// The selected cells of a full column, in file order.
    pub fn pick(&self, column: &[RawValue]) -> Vec<RawValue> {
        self.rows
            .iter()
            .map(|&row| column.get(row).cloned().unwrap_or(RawValue::Missing))
            .collect()
    }

    /// One cell per cohort subject, in cohort order.
    pub fn align(&self, cohort: &Cohort, column: &[RawValue]) -> Vec<RawValue> {
        cohort
            .subjects()
            .iter()
            .map(|subject| {
                self.row_of(subject)
                    .and_then(|row| column.get(row).cloned())
                    .unwrap_or(RawValue::Missing)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn outcome_frame() -> SourceFrame {
        let df = DataFrame::new(vec![
            Series::new(
                "src_subject_id".into(),
                vec!["S1", "S2", "S2", "S3", "S4", "S5", "S1"],
            )
            .into(),
            Series::new(
                "eventname".into(),
                vec![
                    "3_year_follow_up_y_arm_1",
                    "3_year_follow_up_y_arm_1",
                    "3_year_follow_up_y_arm_1",
                    "baseline_year_1_arm_1",
                    "3_year_follow_up_y_arm_1",
                    "3_year_follow_up_y_arm_1",
                    "baseline_year_1_arm_1",
                ],
            )
            .into(),
            Series::new(
                "cbcl_scr_dsm5_depress_r".into(),
                vec![
                    Some("4"),
                    Some("2"),
                    Some("9"),
                    Some("1"),
                    Some("999"),
                    None,
                    Some("3"),
                ],
            )
            .into(),
        ])
        .unwrap();
        SourceFrame::from_dataframe("mh_p_cbcl.csv", df)
    }

    #[test]
    fn keeps_first_valid_row_per_subject() {
        let cohort = select_cohort(
            &outcome_frame(),
            &CohortSpec::default(),
            &SourceSpec::default(),
            &SentinelSet::default(),
        )
        .unwrap();

        assert_eq!(cohort.subjects(), ["S1", "S2"]);
        assert_eq!(cohort.outcomes(), [4.0, 2.0]);
        assert_eq!(cohort.outcome_name(), "3_yr_depress_score");
        assert_eq!(cohort.coverage(1), 0.5);
    }

    #[test]
    fn missing_outcome_column_is_fatal() {
        let spec = CohortSpec {
            outcome_column: "cbcl_scr_dsm5_anxdisord_r".to_string(),
            ..CohortSpec::default()
        };
        let err = select_cohort(
            &outcome_frame(),
            &spec,
            &SourceSpec::default(),
            &SentinelSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingSource { .. }));
    }

    #[test]
    fn baseline_rows_restrict_to_cohort() {
        let cohort = Cohort::from_pairs("y", vec![("S1".to_string(), 1.0), ("S3".to_string(), 2.0)]);
        let rows = BaselineRows::select(&outcome_frame(), &SourceSpec::default(), &cohort).unwrap();
        assert_eq!(rows.rows(), [3, 6]);
        assert_eq!(rows.row_of("S1"), Some(6));

        let column: Vec<RawValue> = (0..7).map(|i| RawValue::Number(i as f64)).collect();
        assert_eq!(
            rows.align(&cohort, &column),
            vec![RawValue::Number(6.0), RawValue::Number(3.0)]
        );
    }
}
