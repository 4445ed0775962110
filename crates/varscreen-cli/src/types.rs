use std::path::PathBuf;

use varscreen_core::{
    CollinearDrop, DroppedColumn, MergeSkip, StudyScreening, TargetCorrelation,
};
use varscreen_score::{Prediction, RiskBand};

#[derive(Debug)]
pub struct ScreenReport {
    pub cohort_size: usize,
    pub screening: StudyScreening,
    pub registry_path: PathBuf,
}

#[derive(Debug)]
pub struct MergeReport {
    pub cohort_size: usize,
    pub columns: usize,
    pub complete_cases: usize,
    pub skipped: Vec<MergeSkip>,
    pub merged_path: PathBuf,
}

#[derive(Debug)]
pub struct EncodeReport {
    pub rows: usize,
    pub variables: usize,
    pub features: usize,
    pub label_threshold: Option<f64>,
    pub dropped: Vec<DroppedColumn>,
    pub pruned: Vec<CollinearDrop>,
    pub top_correlations: Vec<TargetCorrelation>,
    pub encoded_path: PathBuf,
    pub features_path: PathBuf,
    pub catalog_path: PathBuf,
    pub correlations_path: PathBuf,
    pub level_summary_path: PathBuf,
}

#[derive(Debug)]
pub struct RunReport {
    pub screen: ScreenReport,
    pub merge: MergeReport,
    pub encode: EncodeReport,
}

#[derive(Debug)]
pub struct PredictReport {
    pub features: usize,
    pub answered: usize,
    pub prediction: Prediction,
    pub band: RiskBand,
}

impl ScreenReport {
    pub fn has_errors(&self) -> bool {
        self.screening.has_failures()
    }
}

impl MergeReport {
    pub fn has_errors(&self) -> bool {
        !self.skipped.is_empty()
    }
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.screen.has_errors() || self.merge.has_errors()
    }
}
