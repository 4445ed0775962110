use std::collections::BTreeMap;

use proptest::prelude::*;
use varscreen_core::{Cohort, WideColumn, WideTable, classify, encode};
use varscreen_model::{
    ClassifierOptions, EncodingOptions, RawValue, SentinelSet, VariableType,
};

fn classify_default(values: &[RawValue]) -> VariableType {
    classify(
        "item",
        values,
        &SentinelSet::default(),
        &ClassifierOptions::default(),
    )
    .map(|result| result.var_type)
    .unwrap_or(VariableType::Excluded)
}

fn with_share(total: usize, dominant: usize) -> Vec<RawValue> {
    (0..total)
        .map(|i| {
            if i < dominant {
                RawValue::Number(1.0)
            } else {
                RawValue::Number((i % 3 + 2) as f64)
            }
        })
        .collect()
}

#[test]
fn low_variance_boundary_is_strict() {
    // Exactly 95% of valid rows share one value.
    assert_ne!(
        classify_default(&with_share(20, 19)),
        VariableType::LowVariance
    );
    // 95.01%.
    assert_eq!(
        classify_default(&with_share(10_000, 9_501)),
        VariableType::LowVariance
    );
}

#[test]
fn sentinels_do_not_dilute_low_variance() {
    let mut values = with_share(20, 20);
    values.extend(std::iter::repeat_n(RawValue::Number(999.0), 100));
    assert_eq!(classify_default(&values), VariableType::LowVariance);
}

fn cell() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        3 => (0u8..15).prop_map(|v| RawValue::Number(f64::from(v))),
        1 => prop_oneof![Just(555.0), Just(777.0), Just(888.0), Just(999.0)]
            .prop_map(RawValue::Number),
        1 => Just(RawValue::Missing),
    ]
}

fn table_with(values: Vec<RawValue>) -> WideTable {
    let cohort = Cohort::from_pairs(
        "outcome",
        (0..values.len()).map(|i| (format!("S{i}"), i as f64)),
    );
    let mut table = WideTable::from_cohort(&cohort, "src_subject_id");
    table.push_column(WideColumn::new("item", values)).unwrap();
    table
}

proptest! {
    #[test]
    fn classification_is_deterministic(values in prop::collection::vec(cell(), 0..60)) {
        let options = ClassifierOptions::default();
        let sentinels = SentinelSet::default();
        let first = classify("item", &values, &sentinels, &options);
        let second = classify("item", &values, &sentinels, &options);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn valid_count_never_exceeds_rows(values in prop::collection::vec(cell(), 0..60)) {
        if let Some(result) = classify(
            "item",
            &values,
            &SentinelSet::default(),
            &ClassifierOptions::default(),
        ) {
            prop_assert!(result.n_valid <= values.len());
            if let Some(range) = result.value_range {
                prop_assert!(range.min <= range.max);
                prop_assert!(range.max < 555.0);
            }
        }
    }

    #[test]
    fn one_hot_emits_k_minus_one_columns(levels in prop::collection::vec(0u8..8, 1..50)) {
        let values: Vec<RawValue> = levels.iter().map(|v| RawValue::Number(f64::from(*v))).collect();
        let mut distinct = levels.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let types = BTreeMap::from([("item".to_string(), VariableType::Categorical)]);
        let matrix = encode(&table_with(values), &types, &EncodingOptions::default()).unwrap();

        prop_assert_eq!(matrix.width(), distinct.len() - 1);
        for row in matrix.rows() {
            prop_assert!(row.iter().sum::<f64>() <= 1.0);
        }
    }
}
