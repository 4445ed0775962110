use std::fs;
use std::path::Path;

use tempfile::TempDir;
use varscreen_core::{
    ExclusionReason, PipelineError, SourceLayout, StudyConfig, VariableRegistry, WideTable, encode,
    impute, load_cohort, merge, screen_study,
};
use varscreen_model::{
    ClassificationResult, EncodingDescriptor, RawValue, VariableRecord, VariableType,
};

const STUDY: &str = r#"
[cohort]
file = "data/core/mental-health/mh_p_cbcl.csv"

[[domains]]
name = "Mental Health"
path = "data/core/mental-health"
file_filter = "_p_"

[output]
dir = "results"
"#;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Cohort {A, B, C}; D has a sentinel outcome and E is only at baseline.
fn study_fixture() -> (TempDir, StudyConfig) {
    let dir = TempDir::new().unwrap();
    let domain = dir.path().join("data/core/mental-health");
    write(
        &domain.join("mh_p_cbcl.csv"),
        "src_subject_id,eventname,cbcl_scr_dsm5_depress_r\n\
         A,3_year_follow_up_y_arm_1,2\n\
         B,3_year_follow_up_y_arm_1,5\n\
         D,3_year_follow_up_y_arm_1,999\n\
         C,3_year_follow_up_y_arm_1,9\n\
         E,baseline_year_1_arm_1,1\n",
    );
    write(
        &domain.join("mh_p_scenario.csv"),
        "src_subject_id,eventname,x_item,y_item,demo_sex_v2,kbi_gender,comment_timestamp\n\
         A,baseline_year_1_arm_1,1,1,1,1,2019-01-01\n\
         B,baseline_year_1_arm_1,1,1,2,2,2019-01-02\n\
         C,baseline_year_1_arm_1,,2,1,1,2019-01-03\n\
         C,1_year_follow_up_y_arm_1,5,7,1,1,2020-01-03\n\
         E,baseline_year_1_arm_1,1,1,2,2,2019-01-04\n",
    );
    write(
        &domain.join("mh_y_selfreport.csv"),
        "src_subject_id,eventname,z_item\nA,baseline_year_1_arm_1,1\n",
    );
    let config_path = dir.path().join("study.toml");
    fs::write(&config_path, STUDY).unwrap();
    let config = StudyConfig::load(&config_path).unwrap();
    (dir, config)
}

#[test]
fn cohort_is_deterministic_and_excludes_sentinels() {
    let (_dir, config) = study_fixture();
    let first = load_cohort(&config).unwrap();
    let second = load_cohort(&config).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.subjects(), ["A", "B", "C"]);
    assert_eq!(first.outcomes(), [2.0, 5.0, 9.0]);
}

#[test]
fn missing_outcome_table_is_fatal() {
    let (_dir, config) = study_fixture();
    let mut config = config;
    config.cohort.file = "data/core/mental-health/absent.csv".into();
    let err = load_cohort(&config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource { .. }));
    assert!(err.to_string().contains("absent.csv"));
}

#[test]
fn end_to_end_screen_merge_encode() {
    let (_dir, config) = study_fixture();
    let cohort = load_cohort(&config).unwrap();

    let screening = screen_study(&config, &cohort);
    assert!(!screening.has_failures());
    let accepted: Vec<&str> = screening
        .registry
        .iter()
        .map(|r| r.variable.as_str())
        .collect();
    // x_item covers 2 of 3 subjects and fails the gate; only the first sex column survives.
    assert_eq!(accepted, vec!["y_item", "demo_sex_v2"]);

    let domain = &screening.domains[0];
    assert_eq!(domain.files.len(), 2);
    let scenario = &domain.files[1];
    assert_eq!(scenario.source_file, "mh_p_scenario.csv");
    assert_eq!(scenario.cohort_rows, 3);
    assert_eq!(scenario.rejections[&ExclusionReason::LowCoverage], 1);
    assert_eq!(scenario.rejections[&ExclusionReason::Redundant], 1);
    assert_eq!(scenario.rejections[&ExclusionReason::NamePattern], 1);

    let y = &screening.registry.records()[0];
    assert_eq!(y.n_valid, 3);
    assert_eq!(y.n_total, 3);
    assert_eq!(y.n_unique, 2);
    assert_eq!(y.var_type, VariableType::Binary);

    let registry_path = config.output_path(&config.output.registry);
    screening.registry.write_csv(&registry_path).unwrap();
    let registry = VariableRegistry::read_csv(&registry_path).unwrap();
    assert_eq!(registry, screening.registry);

    let merged = merge(&cohort, &registry, &SourceLayout::from_config(&config));
    assert!(merged.skipped.is_empty());
    assert_eq!(merged.table.height(), cohort.len());
    assert_eq!(
        merged.table.column("y_item").unwrap().values,
        vec![
            RawValue::Number(1.0),
            RawValue::Number(1.0),
            RawValue::Number(2.0)
        ]
    );

    let merged_path = config.output_path(&config.output.merged);
    merged.table.write_csv(&merged_path).unwrap();
    let reloaded = WideTable::load(&merged_path, "src_subject_id", "3_yr_depress_score").unwrap();
    assert_eq!(reloaded.subjects(), merged.table.subjects());
    assert_eq!(reloaded.outcome(), merged.table.outcome());

    let imputed = impute(
        &merged.table,
        &merged.column_types,
        &config.sentinels,
        &config.encoding,
    )
    .unwrap();
    let matrix = encode(&imputed.table, &imputed.types, &config.encoding).unwrap();
    assert_eq!(matrix.feature_names(), ["y_item_2", "demo_sex_v2_2"]);
    assert_eq!(matrix.feature("y_item_2").unwrap(), vec![0.0, 0.0, 1.0]);
    assert_eq!(
        matrix.catalog().get("y_item"),
        Some(&EncodingDescriptor::Categorical {
            reference: "1".to_string(),
            levels: vec!["2".to_string()],
        })
    );
    // 75th percentile of {2, 5, 9} is 7.
    assert_eq!(matrix.label_threshold(), Some(7.0));
    assert_eq!(matrix.labels(), Some(&[0u8, 0, 1][..]));
}

#[test]
fn merge_keeps_every_cohort_row_when_sources_fail() {
    let (_dir, config) = study_fixture();
    let cohort = load_cohort(&config).unwrap();
    let result = ClassificationResult {
        n_valid: 3,
        n_unique: 2,
        value_range: None,
        var_type: VariableType::Binary,
    };
    let registry = VariableRegistry::from_records(vec![
        VariableRecord::new("Mental Health", "mh_p_scenario.csv", "y_item", 3, &result),
        VariableRecord::new("Mental Health", "mh_p_scenario.csv", "not_a_column", 3, &result),
        VariableRecord::new("Mental Health", "mh_p_gone.csv", "w_item", 3, &result),
        VariableRecord::new("Mental Health", "mh_y_selfreport.csv", "z_item", 3, &result),
        VariableRecord::new("Substance Use", "su_p_a.csv", "a", 3, &result),
    ]);

    let merged = merge(&cohort, &registry, &SourceLayout::from_config(&config));
    assert_eq!(merged.table.height(), 3);
    assert_eq!(merged.skipped.len(), 3);
    assert_eq!(
        merged.table.column("z_item").unwrap().values,
        vec![RawValue::Number(1.0), RawValue::Missing, RawValue::Missing]
    );
    assert_eq!(merged.table.complete_cases(), 1);
}

#[test]
fn shared_variable_names_are_qualified_by_file() {
    let (dir, config) = study_fixture();
    write(
        &dir.path().join("data/core/mental-health/mh_p_other.csv"),
        "src_subject_id,eventname,y_item\nA,baseline_year_1_arm_1,4\n",
    );
    let cohort = load_cohort(&config).unwrap();
    let result = ClassificationResult {
        n_valid: 3,
        n_unique: 2,
        value_range: None,
        var_type: VariableType::Binary,
    };
    let registry = VariableRegistry::from_records(vec![
        VariableRecord::new("Mental Health", "mh_p_scenario.csv", "y_item", 3, &result),
        VariableRecord::new("Mental Health", "mh_p_other.csv", "y_item", 3, &result),
    ]);
    let merged = merge(&cohort, &registry, &SourceLayout::from_config(&config));
    let names: Vec<&str> = merged.table.column_names().collect();
    assert_eq!(names, vec!["y_item", "y_item.mh_p_other"]);
    assert_eq!(merged.column_types.len(), 2);
}
