//! Scoring models and their persisted form.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::{read_json, write_json};
use crate::error::{Result, ScoreError};
use crate::features::FeatureList;

/// Class decision plus `[p(class 0), p(class 1)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub class: u8,
    pub probabilities: [f64; 2],
}

impl Prediction {
    /// Build from the positive-class probability and a decision threshold.
    pub fn from_positive(p1: f64, threshold: f64) -> Self {
        Self {
            class: u8::from(p1 >= threshold),
            probabilities: [1.0 - p1, p1],
        }
    }

    pub fn positive_probability(&self) -> f64 {
        self.probabilities[1]
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_probability(self.positive_probability())
    }
}

/// Anything that turns an encoded feature row into a prediction.
pub trait ScoringModel {
    fn predict(&self, features: &[f64]) -> Result<Prediction>;
}

impl<F> ScoringModel for F
where
    F: Fn(&[f64]) -> Result<Prediction>,
{
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        self(features)
    }
}

/// Coarse reading of the positive-class probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    pub fn from_probability(p: f64) -> Self {
        if p < 0.25 {
            Self::Low
        } else if p < 0.5 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_threshold() -> f64 {
    0.5
}

/// Logistic regression artifact: intercept and coefficients by feature name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    /// Digest of the feature list the model was fitted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_digest: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LogisticModel {
    pub fn load(path: &Path) -> Result<Self> {
        read_json("model", path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Lay the coefficients out in feature-list order.
    ///
    /// Features without a coefficient weigh zero. A coefficient naming a
    /// feature outside the list is an error, as is a digest mismatch.
    pub fn bind(&self, features: &FeatureList) -> Result<LogisticScorer> {
        if let Some(expected) = &self.feature_digest {
            let actual = features.digest();
            if *expected != actual {
                return Err(ScoreError::FeatureDigestMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        if let Some(stray) = self
            .coefficients
            .keys()
            .find(|name| features.position(name).is_none())
        {
            return Err(ScoreError::CoefficientNotInFeatures(stray.clone()));
        }

        let weights: Vec<f64> = features
            .iter()
            .map(|name| self.coefficients.get(name).copied().unwrap_or(0.0))
            .collect();
        let unweighted = weights.len() - self.coefficients.len();
        if unweighted > 0 {
            warn!(unweighted, "features without a coefficient weigh zero");
        }
        info!(
            features = weights.len(),
            coefficients = self.coefficients.len(),
            "bound logistic model"
        );
        Ok(LogisticScorer {
            intercept: self.intercept,
            weights,
            threshold: self.threshold,
        })
    }
}

/// A [`LogisticModel`] bound to a feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticScorer {
    intercept: f64,
    weights: Vec<f64>,
    threshold: f64,
}

impl LogisticScorer {
    pub fn log_odds(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(ScoreError::FeatureCount {
                expected: self.weights.len(),
                actual: features.len(),
            });
        }
        Ok(self.intercept
            + features
                .iter()
                .zip(&self.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>())
    }
}

impl ScoringModel for LogisticScorer {
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        let z = self.log_odds(features)?;
        let p1 = 1.0 / (1.0 + (-z).exp());
        if !p1.is_finite() {
            return Err(ScoreError::Model(format!("non-finite probability from log-odds {z}")));
        }
        debug!(log_odds = z, probability = p1, "scored feature row");
        Ok(Prediction::from_positive(p1, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureList {
        FeatureList::new(vec!["f1".into(), "f2".into()])
    }

    #[test]
    fn risk_bands_split_at_quarter_and_half() {
        assert_eq!(RiskBand::from_probability(0.24), RiskBand::Low);
        assert_eq!(RiskBand::from_probability(0.25), RiskBand::Moderate);
        assert_eq!(RiskBand::from_probability(0.5), RiskBand::High);
    }

    #[test]
    fn zero_log_odds_is_even() {
        let model = LogisticModel {
            intercept: 0.0,
            coefficients: BTreeMap::from([("f1".to_string(), 2.0)]),
            feature_digest: None,
            threshold: 0.5,
        };
        let scorer = model.bind(&features()).unwrap();
        let prediction = scorer.predict(&[0.0, 5.0]).unwrap();
        assert_eq!(prediction.probabilities, [0.5, 0.5]);
        assert_eq!(prediction.class, 1);
        assert!(matches!(
            scorer.predict(&[1.0]),
            Err(ScoreError::FeatureCount { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn bind_rejects_foreign_coefficients_and_digests() {
        let mut model = LogisticModel {
            intercept: 0.0,
            coefficients: BTreeMap::from([("f9".to_string(), 1.0)]),
            feature_digest: None,
            threshold: 0.5,
        };
        assert!(matches!(
            model.bind(&features()),
            Err(ScoreError::CoefficientNotInFeatures(name)) if name == "f9"
        ));

        model.coefficients.clear();
        model.feature_digest = Some("00".repeat(32));
        assert!(matches!(
            model.bind(&features()),
            Err(ScoreError::FeatureDigestMismatch { .. })
        ));

        model.feature_digest = Some(features().digest());
        assert!(model.bind(&features()).is_ok());
    }
}
