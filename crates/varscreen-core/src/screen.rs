//! Domain screening: structural rules, classification, and the coverage gate.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, info_span, warn};
use varscreen_ingest::{SourceFrame, list_csv_files_matching};
use varscreen_model::{ClassifierOptions, SentinelSet, VariableRecord, VariableType};

use crate::classify::classify;
use crate::cohort::{BaselineRows, Cohort};
use crate::config::{DomainSpec, SourceSpec, StudyConfig};
use crate::error::Result;
use crate::registry::VariableRegistry;
use crate::rules::{ExclusionReason, RedundancyTracker, ScreeningRules};

/// Everything screening needs besides the table itself.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningContext<'a> {
    pub cohort: &'a Cohort,
    pub source: &'a SourceSpec,
    pub rules: &'a ScreeningRules,
    pub sentinels: &'a SentinelSet,
    pub classifier: &'a ClassifierOptions,
}

impl<'a> ScreeningContext<'a> {
    pub fn from_config(config: &'a StudyConfig, cohort: &'a Cohort) -> Self {
        Self {
            cohort,
            source: &config.source,
            rules: &config.screening,
            sentinels: &config.sentinels,
            classifier: &config.classifier,
        }
    }
}

/// Result of screening one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileScreening {
    pub source_file: String,
    /// Baseline rows of cohort members found in the file.
    pub cohort_rows: usize,
    pub columns_examined: usize,
    pub accepted: Vec<VariableRecord>,
    pub rejections: BTreeMap<ExclusionReason, usize>,
}

impl FileScreening {
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    fn reject(&mut self, variable: &str, reason: ExclusionReason) {
        debug!(
            source_file = %self.source_file,
            variable,
            reason = %reason,
            "variable rejected"
        );
        *self.rejections.entry(reason).or_default() += 1;
    }
}

/// A file that could not be screened. Sibling files are unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub domain: String,
    pub source_file: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainScreening {
    pub domain: String,
    pub files: Vec<FileScreening>,
    pub failures: Vec<FileFailure>,
}

impl DomainScreening {
    pub fn accepted(&self) -> impl Iterator<Item = &VariableRecord> {
        self.files.iter().flat_map(|file| file.accepted.iter())
    }

    pub fn accepted_count(&self) -> usize {
        self.files.iter().map(|file| file.accepted.len()).sum()
    }

    /// Rejection totals across the domain's files.
    pub fn rejections(&self) -> BTreeMap<ExclusionReason, usize> {
        let mut totals = BTreeMap::new();
        for file in &self.files {
            for (reason, count) in &file.rejections {
                *totals.entry(*reason).or_default() += count;
            }
        }
        totals
    }
}

/// Screening output for the whole study.
#[derive(Debug, Clone, Default)]
pub struct StudyScreening {
    pub registry: VariableRegistry,
    pub domains: Vec<DomainScreening>,
}

impl StudyScreening {
    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.domains.iter().flat_map(|domain| domain.failures.iter())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Screen an already loaded table.
pub fn screen_frame(
    domain: &str,
    frame: &SourceFrame,
    ctx: &ScreeningContext<'_>,
    tracker: &mut RedundancyTracker,
) -> Result<FileScreening> {
    let baseline = BaselineRows::select(frame, ctx.source, ctx.cohort)?;
    let file_name = frame.file_name();
    let identifiers = ctx.source.identifiers();
    let columns = frame.column_names();

    let mut screening = FileScreening {
        source_file: file_name.to_string(),
        cohort_rows: baseline.len(),
        columns_examined: columns.len(),
        ..FileScreening::default()
    };

    if baseline.is_empty() {
        warn!(
            domain,
            source_file = %file_name,
            "no cohort subjects at baseline"
        );
    }

    for column in &columns {
        if let Some(reason) =
            ctx.rules
                .structural_exclusion(file_name, column, &identifiers, &*tracker)
        {
            screening.reject(column, reason);
            continue;
        }

        let values = baseline.pick(&frame.column_values(column)?);
        let Some(result) = classify(column, &values, ctx.sentinels, ctx.classifier) else {
            screening.reject(column, ExclusionReason::FreeText);
            continue;
        };

        if !ctx.rules.passes_coverage(result.n_valid, ctx.cohort.len()) {
            screening.reject(column, ExclusionReason::LowCoverage);
            continue;
        }
        match result.var_type {
            VariableType::LowVariance => screening.reject(column, ExclusionReason::LowVariance),
            VariableType::Unknown | VariableType::Excluded => {
                screening.reject(column, ExclusionReason::UnknownType);
            }
            _ => {
                if let Some(category) = tracker.claim(ctx.rules, file_name, column) {
                    debug!(
                        variable = %column,
                        category = %category,
                        "redundancy representative"
                    );
                }
                screening.accepted.push(VariableRecord::new(
                    domain,
                    file_name,
                    column.as_str(),
                    ctx.cohort.len(),
                    &result,
                ));
            }
        }
    }

    info!(
        domain,
        source_file = %file_name,
        cohort_rows = screening.cohort_rows,
        columns = screening.columns_examined,
        accepted = screening.accepted.len(),
        rejected = screening.rejected(),
        "screened file"
    );
    Ok(screening)
}

/// Load and screen one file.
pub fn screen_file(
    domain: &str,
    path: &Path,
    ctx: &ScreeningContext<'_>,
    tracker: &mut RedundancyTracker,
) -> Result<FileScreening> {
    let frame = SourceFrame::load(path)?;
    screen_frame(domain, &frame, ctx, tracker)
}

/// Screen every matching file of a domain directory.
///
/// Per-file errors are recorded as failures; only an unreadable directory
/// fails the domain.
pub fn screen_domain(
    domain: &DomainSpec,
    dir: &Path,
    ctx: &ScreeningContext<'_>,
    tracker: &mut RedundancyTracker,
) -> Result<DomainScreening> {
    let span = info_span!("domain", domain = %domain.name);
    let _guard = span.enter();
    let start = Instant::now();

    let files = list_csv_files_matching(dir, domain.file_filter.as_deref())?;
    if files.is_empty() {
        warn!(dir = %dir.display(), "no matching CSV files in domain");
    }

    let mut screening = DomainScreening {
        domain: domain.name.clone(),
        ..DomainScreening::default()
    };
    for path in &files {
        match screen_file(&domain.name, path, ctx, tracker) {
            Ok(file) => screening.files.push(file),
            Err(err) => {
                let source_file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                warn!(source_file = %source_file, error = %err, "file screening failed");
                screening.failures.push(FileFailure {
                    domain: domain.name.clone(),
                    source_file,
                    message: err.to_string(),
                });
            }
        }
    }

    info!(
        files = screening.files.len(),
        failures = screening.failures.len(),
        accepted = screening.accepted_count(),
        duration_ms = start.elapsed().as_millis(),
        "domain screened"
    );
    Ok(screening)
}

/// Screen all configured domains with one shared redundancy tracker.
pub fn screen_study(config: &StudyConfig, cohort: &Cohort) -> StudyScreening {
    let ctx = ScreeningContext::from_config(config, cohort);
    let mut tracker = RedundancyTracker::new();
    let mut study = StudyScreening::default();

    for domain in &config.domains {
        let dir = config.resolve(&domain.path);
        let screening = match screen_domain(domain, &dir, &ctx, &mut tracker) {
            Ok(screening) => screening,
            Err(err) => {
                warn!(domain = %domain.name, error = %err, "domain skipped");
                DomainScreening {
                    domain: domain.name.clone(),
                    files: Vec::new(),
                    failures: vec![FileFailure {
                        domain: domain.name.clone(),
                        source_file: String::new(),
                        message: err.to_string(),
                    }],
                }
            }
        };
        study.registry.extend(screening.accepted().cloned());
        study.domains.push(screening);
    }

    info!(
        domains = study.domains.len(),
        variables = study.registry.len(),
        "screening complete"
    );
    study
}
