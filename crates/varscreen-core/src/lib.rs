//! Variable screening and table consolidation.
//!
//! Stages run in dependency order, each taking the previous stage's output
//! and the cohort computed once at the start of a run:
//!
//! 1. [`cohort`]: reference cohort from the follow-up outcome
//! 2. [`screen`]: structural [`rules`], [`classify`] and the coverage gate per domain file
//! 3. [`merge`]: accepted variables left-joined onto the cohort
//! 4. [`impute`] and optional [`prune`]
//! 5. [`encode`]: one-hot and z-scored feature matrix

pub mod classify;
pub mod cohort;
pub mod config;
pub mod encode;
pub mod error;
pub mod impute;
pub mod merge;
pub mod prune;
pub mod registry;
pub mod rules;
pub mod screen;

pub use classify::classify;
pub use cohort::{BaselineRows, Cohort, load_cohort, select_cohort};
pub use config::{CohortSpec, DomainSpec, OutputSpec, PruningSpec, SourceSpec, StudyConfig};
pub use encode::{EncodedMatrix, LABEL_COLUMN, encode};
pub use error::{PipelineError, Result};
pub use impute::{DropReason, DroppedColumn, FillRule, Imputed, impute};
pub use merge::{MergeOutcome, MergeSkip, SourceLayout, WideColumn, WideTable, merge};
pub use prune::{
    CollinearDrop, LevelSummary, PruneOutcome, TargetCorrelation, prune_collinear,
    rank_by_target, summarize_levels, write_correlations, write_level_summary,
};
pub use registry::{SourceGroup, VariableRegistry};
pub use rules::{ExclusionReason, RedundancyTracker, RedundancyVerdict, ScreeningRules};
pub use screen::{
    DomainScreening, FileFailure, FileScreening, ScreeningContext, StudyScreening, screen_domain,
    screen_file, screen_frame, screen_study,
};
