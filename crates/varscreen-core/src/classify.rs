//! Variable classification.
//!
//! Classification is a pure function of the column values and the options:
//! the same column always receives the same type.

use std::collections::BTreeMap;

use varscreen_model::{
    ClassificationResult, ClassifierOptions, RawValue, SentinelKind, SentinelSet, ValueRange,
    VariableType,
};

/// Classify one column of cohort-restricted values.
///
/// Returns `None` for free-text columns (non-numeric with more distinct
/// values than `max_text_levels`); these are never eligible.
pub fn classify(
    name: &str,
    values: &[RawValue],
    sentinels: &SentinelSet,
    options: &ClassifierOptions,
) -> Option<ClassificationResult> {
    let mut n_valid = 0usize;
    let mut sample: Vec<&RawValue> = Vec::with_capacity(values.len());
    for value in values {
        match sentinels.kind(value) {
            SentinelKind::Real => {
                n_valid += 1;
                sample.push(value);
            }
            SentinelKind::Branching if sentinels.counts_as_valid(value) => n_valid += 1,
            SentinelKind::Branching | SentinelKind::Invalid => {}
        }
    }

    let numeric = sample.iter().all(|value| value.as_number().is_some());
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in &sample {
        if let Some(key) = value.key() {
            *counts.entry(key).or_default() += 1;
        }
    }
    let n_unique = counts.len();

    if !numeric && n_unique > options.max_text_levels {
        tracing::trace!(variable = name, n_unique, "free-text column");
        return None;
    }

    let result = |value_range, var_type| ClassificationResult {
        n_valid,
        n_unique,
        value_range,
        var_type,
    };

    if sample.is_empty() {
        return Some(result(None, VariableType::Unknown));
    }

    let modal = counts.values().copied().max().unwrap_or(0);
    if modal as f64 / sample.len() as f64 > options.low_variance_ratio {
        return Some(result(None, VariableType::LowVariance));
    }

    if !numeric {
        return Some(result(None, VariableType::Categorical));
    }

    let range = sample
        .iter()
        .filter_map(|value| value.as_number())
        .fold(None, |acc: Option<ValueRange>, v| {
            Some(match acc {
                None => ValueRange { min: v, max: v },
                Some(range) => ValueRange {
                    min: range.min.min(v),
                    max: range.max.max(v),
                },
            })
        });

    let var_type = if options.is_forced_categorical(name) {
        VariableType::Categorical
    } else if n_unique == 2 {
        VariableType::Binary
    } else if n_unique > options.max_discrete_levels {
        VariableType::Continuous
    } else if n_unique >= 3 {
        VariableType::Ordinal
    } else {
        VariableType::Unknown
    };

    Some(result(range, var_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use varscreen_model::BranchingPolicy;

    fn numbers(values: &[f64]) -> Vec<RawValue> {
        values.iter().map(|v| RawValue::Number(*v)).collect()
    }

    fn classify_default(name: &str, values: &[RawValue]) -> Option<ClassificationResult> {
        classify(
            name,
            values,
            &SentinelSet::default(),
            &ClassifierOptions::default(),
        )
    }

    #[test]
    fn type_inference_by_distinct_count() {
        let binary = classify_default("q", &numbers(&[0.0, 1.0, 1.0, 0.0])).unwrap();
        assert_eq!(binary.var_type, VariableType::Binary);

        let ordinal = classify_default("q", &numbers(&[0.0, 1.0, 2.0, 2.0])).unwrap();
        assert_eq!(ordinal.var_type, VariableType::Ordinal);
        assert_eq!(ordinal.value_range, Some(ValueRange { min: 0.0, max: 2.0 }));

        let values: Vec<f64> = (0..11).map(f64::from).collect();
        let continuous = classify_default("q", &numbers(&values)).unwrap();
        assert_eq!(continuous.var_type, VariableType::Continuous);
    }

    #[test]
    fn forced_categorical_by_name_fragment() {
        let result = classify_default("demo_race_a_p", &numbers(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(result.var_type, VariableType::Categorical);
    }

    #[test]
    fn sentinels_excluded_from_statistics() {
        let values = numbers(&[1.0, 2.0, 999.0, 888.0, 555.0, 3.0]);
        let result = classify_default("q", &values).unwrap();
        // 888 counts as a valid response, but not as a level.
        assert_eq!(result.n_valid, 4);
        assert_eq!(result.n_unique, 3);
        assert_eq!(result.value_range, Some(ValueRange { min: 1.0, max: 3.0 }));
    }

    #[test]
    fn branching_code_counts_toward_valid_only_when_configured() {
        let values = numbers(&[1.0, 2.0, 888.0, 888.0, 999.0]);
        let options = ClassifierOptions::default();

        let lenient = classify("q", &values, &SentinelSet::default(), &options).unwrap();
        assert_eq!(lenient.n_valid, 4);

        let strict = SentinelSet::default().with_branching_policy(BranchingPolicy::CountAsMissing);
        let result = classify("q", &values, &strict, &options).unwrap();
        assert_eq!(result.n_valid, 2);
        assert_eq!(result.n_unique, lenient.n_unique);
        assert_eq!(result.var_type, VariableType::Binary);
    }

    #[test]
    fn low_variance_ratio_is_configurable() {
        // Modal share 0.9: below the default cut-off, above a stricter one.
        let mut values = vec![1.0; 9];
        values.push(0.0);
        let values = numbers(&values);
        assert_eq!(
            classify_default("q", &values).unwrap().var_type,
            VariableType::Binary
        );
        let options = ClassifierOptions::default().with_low_variance_ratio(0.85);
        let result = classify("q", &values, &SentinelSet::default(), &options).unwrap();
        assert_eq!(result.var_type, VariableType::LowVariance);
    }

    #[test]
    fn free_text_is_ineligible() {
        let values: Vec<RawValue> = (0..11)
            .map(|i| RawValue::Text(format!("answer {i}")))
            .collect();
        assert!(classify_default("comment", &values).is_none());

        let few = vec![
            RawValue::Text("yes".into()),
            RawValue::Text("no".into()),
            RawValue::Text("maybe".into()),
        ];
        assert_eq!(
            classify_default("c", &few).unwrap().var_type,
            VariableType::Categorical
        );
    }

    #[test]
    fn all_missing_is_unknown() {
        let result = classify_default("q", &[RawValue::Missing, RawValue::Number(777.0)]).unwrap();
        assert_eq!(result.var_type, VariableType::Unknown);
        assert_eq!(result.n_valid, 0);
    }
}
