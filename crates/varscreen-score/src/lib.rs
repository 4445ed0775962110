//! Scoring adapter: encodes one respondent's answers with the persisted
//! feature list and encoding catalog, then hands the row to a model.

mod artifact;
pub mod adapter;
pub mod catalog;
pub mod error;
pub mod features;
pub mod model;

pub use adapter::ScoringAdapter;
pub use catalog::{load_catalog, save_catalog};
pub use error::{Result, ScoreError};
pub use features::FeatureList;
pub use model::{LogisticModel, LogisticScorer, Prediction, RiskBand, ScoringModel};
