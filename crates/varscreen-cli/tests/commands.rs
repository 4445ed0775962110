//! Stage drivers run against a small on-disk study.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use varscreen_cli::cli::{EncodeArgs, PredictArgs, StudyArgs};
use varscreen_cli::commands::{
    collect_answers, merged_column_types, run_all, run_encode, run_merge, run_predict, run_screen,
};
use varscreen_core::{VariableRegistry, WideTable};
use varscreen_model::VariableType;
use varscreen_score::{FeatureList, RiskBand, load_catalog};

const STUDY: &str = r#"
[[domains]]
name = "Mental Health"
path = "data/core/mental-health"
file_filter = "_p_"
"#;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn study() -> (TempDir, StudyArgs) {
    let dir = TempDir::new().unwrap();
    let domain = dir.path().join("data/core/mental-health");
    write(
        &domain.join("mh_p_cbcl.csv"),
        "src_subject_id,eventname,cbcl_scr_dsm5_depress_r\n\
         A,3_year_follow_up_y_arm_1,2\n\
         B,3_year_follow_up_y_arm_1,5\n\
         C,3_year_follow_up_y_arm_1,9\n",
    );
    write(
        &domain.join("mh_p_scenario.csv"),
        "src_subject_id,eventname,y_item,demo_sex_v2\n\
         A,baseline_year_1_arm_1,1,1\n\
         B,baseline_year_1_arm_1,1,2\n\
         C,baseline_year_1_arm_1,2,1\n",
    );
    let config = dir.path().join("study.toml");
    fs::write(&config, STUDY).unwrap();
    let args = StudyArgs {
        config,
        data_root: None,
        output_dir: None,
        strict: true,
    };
    (dir, args)
}

fn encode_args(study: StudyArgs) -> EncodeArgs {
    EncodeArgs {
        study,
        prune: false,
        prune_threshold: None,
    }
}

fn results(dir: &TempDir) -> PathBuf {
    dir.path().join("results")
}

#[test]
fn staged_commands_match_single_run() {
    let (dir, args) = study();

    let screen = run_screen(&args).unwrap();
    assert!(!screen.has_errors());
    assert_eq!(screen.cohort_size, 3);
    assert_eq!(screen.screening.registry.len(), 2);

    let merge = run_merge(&args).unwrap();
    assert!(!merge.has_errors());
    assert_eq!(merge.columns, 2);
    assert_eq!(merge.complete_cases, 3);

    let staged = run_encode(&encode_args(args.clone())).unwrap();
    let staged_features =
        FeatureList::load(&results(&dir).join("model_feature_names.json")).unwrap();

    let run = run_all(&encode_args(args)).unwrap();
    assert!(!run.has_errors());
    assert_eq!(run.encode.features, staged.features);
    assert_eq!(run.encode.label_threshold, Some(7.0));
    let features = FeatureList::load(&run.encode.features_path).unwrap();
    assert_eq!(features, staged_features);
    assert_eq!(features.names(), ["y_item_2", "demo_sex_v2_2"]);
    assert!(run.encode.correlations_path.is_file());
    let levels = fs::read_to_string(&run.encode.level_summary_path).unwrap();
    assert_eq!(
        levels,
        "variable,n_unique,unique_values\ny_item,2,1; 2\ndemo_sex_v2,2,1; 2\n"
    );

    let catalog = load_catalog(&run.encode.catalog_path).unwrap();
    insta::assert_json_snapshot!(catalog, @r#"
    {
      "demo_sex_v2": {
        "kind": "categorical",
        "reference": "1",
        "levels": [
          "2"
        ]
      },
      "y_item": {
        "kind": "categorical",
        "reference": "1",
        "levels": [
          "2"
        ]
      }
    }
    "#);
}

#[test]
fn qualified_columns_take_their_file_type() {
    let (dir, args) = study();
    run_screen(&args).unwrap();
    run_merge(&args).unwrap();
    let registry =
        VariableRegistry::read_csv(&results(&dir).join("variable_analysis_results.csv")).unwrap();
    let table = WideTable::load(
        &results(&dir).join("merged_variables.csv"),
        "src_subject_id",
        "3_yr_depress_score",
    )
    .unwrap();
    let types = merged_column_types(&table, &registry);
    assert_eq!(types["y_item"], VariableType::Binary);
    assert_eq!(types.len(), 2);
}

#[test]
fn missing_registry_fails_merge() {
    let (_dir, args) = study();
    let err = run_merge(&args).unwrap_err();
    assert!(format!("{err:#}").contains("variable_analysis_results.csv"));
}

#[test]
fn predict_scores_answers_against_run_artifacts() {
    let (dir, args) = study();
    let run = run_all(&encode_args(args)).unwrap();
    let model = dir.path().join("model.json");
    fs::write(
        &model,
        r#"{ "intercept": 0.0, "coefficients": { "y_item_2": 1.0 } }"#,
    )
    .unwrap();
    let answers = dir.path().join("answers.json");
    fs::write(&answers, r#"{ "y_item": 1, "demo_sex_v2": null }"#).unwrap();

    let mut predict = PredictArgs {
        features: run.encode.features_path.clone(),
        catalog: run.encode.catalog_path.clone(),
        model,
        answers: vec![("y_item".to_string(), "2".to_string())],
        answers_file: Some(answers),
    };
    let collected = collect_answers(&predict).unwrap();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected["y_item"], "2");

    let report = run_predict(&predict).unwrap();
    assert_eq!(report.answered, 1);
    assert_eq!(report.prediction.class, 1);
    assert!((report.prediction.probabilities[1] - 0.731_058_578_6).abs() < 1e-9);
    assert_eq!(report.band, RiskBand::High);

    predict.answers.clear();
    let report = run_predict(&predict).unwrap();
    assert_eq!(report.prediction.probabilities, [0.5, 0.5]);
}
