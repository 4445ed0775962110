use std::cell::RefCell;
use std::collections::BTreeMap;

use tempfile::TempDir;
use varscreen_model::{EncodingCatalog, EncodingDescriptor};
use varscreen_score::{
    FeatureList, LogisticModel, Prediction, RiskBand, ScoreError, ScoringAdapter, load_catalog,
    save_catalog,
};

fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn binary_catalog() -> EncodingCatalog {
    let mut catalog = EncodingCatalog::new();
    catalog.insert(
        "f1",
        EncodingDescriptor::Binary {
            mapping: BTreeMap::from([("Yes".to_string(), 0.75), ("No".to_string(), -0.75)]),
        },
    );
    catalog.insert(
        "f2",
        EncodingDescriptor::Continuous {
            mean: 33.0,
            std_dev: 11.0,
        },
    );
    catalog
}

#[test]
fn model_sees_persisted_order_and_prediction_passes_through() {
    let features = FeatureList::new(vec!["f1".into(), "f2".into()]);
    let adapter = ScoringAdapter::new(features, &binary_catalog());

    let seen = RefCell::new(Vec::new());
    let model = |row: &[f64]| -> varscreen_score::Result<Prediction> {
        seen.borrow_mut().extend_from_slice(row);
        Ok(Prediction {
            class: 1,
            probabilities: [0.3, 0.7],
        })
    };

    let prediction = adapter
        .predict(&model, &answers(&[("f1", "Yes"), ("unused", "3")]))
        .unwrap();
    assert_eq!(*seen.borrow(), vec![0.75, 0.0]);
    assert_eq!(prediction.class, 1);
    assert_eq!(prediction.probabilities, [0.3, 0.7]);
    assert_eq!(prediction.risk_band(), RiskBand::High);
}

#[test]
fn novel_category_encodes_as_reference() {
    let mut catalog = EncodingCatalog::new();
    catalog.insert(
        "race",
        EncodingDescriptor::Categorical {
            reference: "1".to_string(),
            levels: vec!["2".to_string(), "3".to_string()],
        },
    );
    let features = FeatureList::new(vec!["race_2".into(), "race_3".into()]);
    let adapter = ScoringAdapter::new(features, &catalog);

    assert_eq!(adapter.encode_answers(&answers(&[("race", "3")])), vec![0.0, 1.0]);
    assert_eq!(adapter.encode_answers(&answers(&[("race", "7")])), vec![0.0, 0.0]);
    assert_eq!(adapter.encode_answers(&answers(&[])), vec![0.0, 0.0]);
}

#[test]
fn artifacts_round_trip_and_bind() {
    let dir = TempDir::new().unwrap();
    let features = FeatureList::new(vec!["f1".into(), "f2".into()]);
    insta::assert_json_snapshot!(features, @r#"
    [
      "f1",
      "f2"
    ]
    "#);

    let features_path = dir.path().join("model_feature_names.json");
    let catalog_path = dir.path().join("encoding_catalog.json");
    let model_path = dir.path().join("model.json");
    features.save(&features_path).unwrap();
    save_catalog(&catalog_path, &binary_catalog()).unwrap();
    LogisticModel {
        intercept: -0.75,
        coefficients: BTreeMap::from([("f1".to_string(), 1.0)]),
        feature_digest: Some(features.digest()),
        threshold: 0.5,
    }
    .save(&model_path)
    .unwrap();

    let features = FeatureList::load(&features_path).unwrap();
    let catalog = load_catalog(&catalog_path).unwrap();
    assert_eq!(catalog, binary_catalog());
    let scorer = LogisticModel::load(&model_path).unwrap().bind(&features).unwrap();

    let adapter = ScoringAdapter::new(features, &catalog);
    let prediction = adapter
        .predict(&scorer, &answers(&[("f1", "yes"), ("f2", "33")]))
        .unwrap();
    assert_eq!(prediction.probabilities, [0.5, 0.5]);
    assert_eq!(prediction.class, 1);
}

#[test]
fn missing_artifacts_are_reported() {
    let dir = TempDir::new().unwrap();
    let err = FeatureList::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(
        err,
        ScoreError::MissingArtifact {
            what: "feature list",
            ..
        }
    ));
    assert!(load_catalog(&dir.path().join("absent.json")).is_err());
}
