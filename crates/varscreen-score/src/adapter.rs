//! Maps a respondent's answers onto the persisted feature vector.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};
use varscreen_model::{EncodingCatalog, EncodingDescriptor, RawValue, format_numeric};

use crate::error::Result;
use crate::features::FeatureList;
use crate::model::{Prediction, ScoringModel};

/// How one feature slot is filled from its variable's answer.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Mapped(BTreeMap<String, f64>),
    Standardized { mean: f64, std_dev: f64 },
    Indicator(String),
    /// Not described by the catalog; a numeric answer is used as is.
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    variable: String,
    slot: Slot,
}

/// Encodes answer sets in the exact order of a [`FeatureList`].
#[derive(Debug, Clone)]
pub struct ScoringAdapter {
    features: FeatureList,
    bindings: Vec<Binding>,
    variables: BTreeSet<String>,
}

impl ScoringAdapter {
    pub fn new(features: FeatureList, catalog: &EncodingCatalog) -> Self {
        let mut by_feature: BTreeMap<String, Binding> = BTreeMap::new();
        for (variable, descriptor) in catalog.iter() {
            let names = descriptor.feature_names(variable);
            match descriptor {
                EncodingDescriptor::Binary { mapping } | EncodingDescriptor::Ordinal { mapping } => {
                    by_feature.insert(
                        variable.clone(),
                        Binding {
                            variable: variable.clone(),
                            slot: Slot::Mapped(mapping.clone()),
                        },
                    );
                }
                EncodingDescriptor::Continuous { mean, std_dev } => {
                    by_feature.insert(
                        variable.clone(),
                        Binding {
                            variable: variable.clone(),
                            slot: Slot::Standardized {
                                mean: *mean,
                                std_dev: *std_dev,
                            },
                        },
                    );
                }
                EncodingDescriptor::Categorical { levels, .. } => {
                    for (name, level) in names.into_iter().zip(levels) {
                        by_feature.insert(
                            name,
                            Binding {
                                variable: variable.clone(),
                                slot: Slot::Indicator(level.clone()),
                            },
                        );
                    }
                }
            }
        }

        let bindings: Vec<Binding> = features
            .iter()
            .map(|feature| {
                by_feature.remove(feature).unwrap_or_else(|| {
                    debug!(feature, "feature has no catalog entry");
                    Binding {
                        variable: feature.to_string(),
                        slot: Slot::Raw,
                    }
                })
            })
            .collect();
        let variables = bindings.iter().map(|b| b.variable.clone()).collect();
        Self {
            features,
            bindings,
            variables,
        }
    }

    pub fn features(&self) -> &FeatureList {
        &self.features
    }

    /// Variables an answer set may refer to.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// One value per feature, in persisted order.
    ///
    /// Absent or unrecognised answers encode as `0.0`; answers for variables
    /// the feature list does not use are ignored.
    pub fn encode_answers(&self, answers: &BTreeMap<String, String>) -> Vec<f64> {
        let ignored = answers
            .keys()
            .filter(|variable| !self.variables.contains(*variable))
            .count();
        if ignored > 0 {
            debug!(ignored, "answers for unknown variables ignored");
        }

        self.bindings
            .iter()
            .zip(self.features.iter())
            .map(|(binding, feature)| {
                let Some(answer) = answers.get(&binding.variable) else {
                    return 0.0;
                };
                if binding.slot == Slot::Raw {
                    warn!(
                        variable = %binding.variable,
                        feature,
                        "answer passed through without an encoding descriptor"
                    );
                }
                encode_slot(&binding.slot, answer).unwrap_or_else(|| {
                    warn!(variable = %binding.variable, feature, "unrecognised answer");
                    0.0
                })
            })
            .collect()
    }

    /// Encode `answers` and score them with `model`.
    pub fn predict<M: ScoringModel + ?Sized>(
        &self,
        model: &M,
        answers: &BTreeMap<String, String>,
    ) -> Result<Prediction> {
        let row = self.encode_answers(answers);
        model.predict(&row)
    }
}

/// Canonical key of an answer: numbers lose trailing zeros.
fn answer_key(answer: &str) -> Option<String> {
    RawValue::parse(answer).key()
}

fn lookup(mapping: &BTreeMap<String, f64>, answer: &str) -> Option<f64> {
    let answer = answer.trim();
    if let Some(value) = mapping.get(answer) {
        return Some(*value);
    }
    if let Some(value) = answer_key(answer).and_then(|key| mapping.get(&key)) {
        return Some(*value);
    }
    mapping
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(answer))
        .map(|(_, value)| *value)
}

fn encode_slot(slot: &Slot, answer: &str) -> Option<f64> {
    match slot {
        Slot::Mapped(mapping) => lookup(mapping, answer),
        Slot::Standardized { mean, std_dev } => RawValue::parse(answer)
            .as_number()
            .map(|x| EncodingDescriptor::standardize(*mean, *std_dev, x)),
        Slot::Indicator(level) => {
            let key = answer_key(answer)?;
            let hit = key == *level
                || key.eq_ignore_ascii_case(level)
                || level
                    .parse::<f64>()
                    .is_ok_and(|l| format_numeric(l) == key);
            Some(if hit { 1.0 } else { 0.0 })
        }
        Slot::Raw => RawValue::parse(answer).as_number(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn mapping_lookup_normalizes_answers() {
        let map = mapping(&[("0", -0.75), ("1", 0.75), ("Yes", 0.75)]);
        assert_eq!(lookup(&map, "1"), Some(0.75));
        assert_eq!(lookup(&map, "1.0"), Some(0.75));
        assert_eq!(lookup(&map, " yes "), Some(0.75));
        assert_eq!(lookup(&map, "maybe"), None);
    }

    #[test]
    fn indicator_matches_numeric_levels() {
        let slot = Slot::Indicator("2".to_string());
        assert_eq!(encode_slot(&slot, "2.0"), Some(1.0));
        assert_eq!(encode_slot(&slot, "3"), Some(0.0));
        assert_eq!(encode_slot(&slot, ""), None);
    }

    #[test]
    fn uncatalogued_features_take_numeric_answers() {
        let mut catalog = EncodingCatalog::new();
        catalog.insert(
            "q".to_string(),
            EncodingDescriptor::Binary {
                mapping: mapping(&[("0", -1.0), ("1", 1.0)]),
            },
        );
        let features = FeatureList::new(vec!["age_years".to_string(), "q".to_string()]);
        let adapter = ScoringAdapter::new(features, &catalog);
        assert_eq!(adapter.variables().collect::<Vec<_>>(), vec!["age_years", "q"]);

        let answers = BTreeMap::from([
            ("age_years".to_string(), "12.5".to_string()),
            ("q".to_string(), "1".to_string()),
        ]);
        assert_eq!(adapter.encode_answers(&answers), vec![12.5, 1.0]);

        let text = BTreeMap::from([("age_years".to_string(), "twelve".to_string())]);
        assert_eq!(adapter.encode_answers(&text), vec![0.0, 0.0]);
    }

    #[test]
    fn continuous_answers_are_standardized() {
        let slot = Slot::Standardized {
            mean: 33.0,
            std_dev: 11.0,
        };
        assert_eq!(encode_slot(&slot, "44"), Some(1.0));
        assert_eq!(encode_slot(&slot, "n/a"), None);
    }
}
