use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, info_span, trace};
use varscreen_core::{
    Cohort, SourceLayout, StudyConfig, VariableRegistry, WideTable, encode, impute, load_cohort,
    merge, prune_collinear, rank_by_target, screen_study, summarize_levels, write_correlations,
    write_level_summary,
};
use varscreen_model::VariableType;
use varscreen_score::{FeatureList, LogisticModel, ScoringAdapter, load_catalog, save_catalog};

use crate::cli::{EncodeArgs, PredictArgs, StudyArgs};
use crate::logging::redact_value;
use crate::types::{EncodeReport, MergeReport, PredictReport, RunReport, ScreenReport};

/// Correlations listed in the encode summary.
const TOP_CORRELATIONS: usize = 10;

/// Load the study file and apply command-line overrides.
pub fn load_config(args: &StudyArgs) -> Result<StudyConfig> {
    let mut config = StudyConfig::load(&args.config)
        .with_context(|| format!("load study config {}", args.config.display()))?;
    if let Some(root) = &args.data_root {
        config = config.with_data_root(root.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    Ok(config)
}

fn cohort_stage(config: &StudyConfig) -> Result<Cohort> {
    let start = Instant::now();
    let cohort = load_cohort(config).context("select cohort")?;
    if let (Some(first), Some(last)) = (cohort.subjects().first(), cohort.subjects().last()) {
        trace!(
            first = redact_value(first),
            last = redact_value(last),
            "cohort bounds"
        );
    }
    info!(
        subjects = cohort.len(),
        outcome = cohort.outcome_name(),
        duration_ms = start.elapsed().as_millis(),
        "cohort selected"
    );
    Ok(cohort)
}

fn screen_stage(config: &StudyConfig, cohort: &Cohort) -> Result<ScreenReport> {
    let span = info_span!("screen", domains = config.domains.len());
    let _guard = span.enter();
    let start = Instant::now();
    let screening = screen_study(config, cohort);
    let registry_path = config.output_path(&config.output.registry);
    screening
        .registry
        .write_csv(&registry_path)
        .with_context(|| format!("write registry {}", registry_path.display()))?;
    info!(
        variables = screening.registry.len(),
        failures = screening.failures().count(),
        path = %registry_path.display(),
        duration_ms = start.elapsed().as_millis(),
        "screen stage complete"
    );
    Ok(ScreenReport {
        cohort_size: cohort.len(),
        screening,
        registry_path,
    })
}

fn merge_stage(
    config: &StudyConfig,
    cohort: &Cohort,
    registry: &VariableRegistry,
) -> Result<(MergeReport, WideTable, BTreeMap<String, VariableType>)> {
    let span = info_span!("merge", variables = registry.len());
    let _guard = span.enter();
    let start = Instant::now();
    let outcome = merge(cohort, registry, &SourceLayout::from_config(config));
    let merged_path = config.output_path(&config.output.merged);
    outcome
        .table
        .write_csv(&merged_path)
        .with_context(|| format!("write merged table {}", merged_path.display()))?;
    let report = MergeReport {
        cohort_size: cohort.len(),
        columns: outcome.table.width(),
        complete_cases: outcome.table.complete_cases(),
        skipped: outcome.skipped,
        merged_path,
    };
    info!(
        rows = outcome.table.height(),
        columns = report.columns,
        complete_cases = report.complete_cases,
        skipped = report.skipped.len(),
        duration_ms = start.elapsed().as_millis(),
        "merge stage complete"
    );
    Ok((report, outcome.table, outcome.column_types))
}

fn encode_stage(
    config: &StudyConfig,
    table: &WideTable,
    types: &BTreeMap<String, VariableType>,
    args: &EncodeArgs,
) -> Result<EncodeReport> {
    let span = info_span!("encode", columns = table.width(), prune = args.prune);
    let _guard = span.enter();
    let start = Instant::now();

    let imputed = impute(table, types, &config.sentinels, &config.encoding).context("impute")?;
    let levels = summarize_levels(&imputed.table, config.encoding.fallback_discrete_levels);
    let level_summary_path = config.output_path(&config.output.level_summary);
    write_level_summary(&level_summary_path, &levels)
        .with_context(|| format!("write level summary {}", level_summary_path.display()))?;
    debug!(variables = levels.len(), "low-cardinality variables summarised");

    let prune_enabled = args.prune || config.pruning.enabled;
    let (table, pruned) = if prune_enabled {
        let threshold = args.prune_threshold.unwrap_or(config.pruning.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            bail!("prune threshold must be within [0, 1], got {threshold}");
        }
        let outcome = prune_collinear(&imputed.table, threshold).context("prune")?;
        (outcome.table, outcome.dropped)
    } else {
        (imputed.table, Vec::new())
    };

    let ranking = rank_by_target(&table);
    let correlations_path = config.output_path(&config.output.correlations);
    write_correlations(&correlations_path, &ranking)
        .with_context(|| format!("write correlations {}", correlations_path.display()))?;

    let matrix = encode(&table, &imputed.types, &config.encoding).context("encode")?;
    let encoded_path = config.output_path(&config.output.encoded);
    matrix
        .write_csv(&encoded_path)
        .with_context(|| format!("write encoded matrix {}", encoded_path.display()))?;

    let features_path = config.output_path(&config.output.features);
    let features = FeatureList::new(matrix.feature_names().to_vec());
    features
        .save(&features_path)
        .with_context(|| format!("write feature list {}", features_path.display()))?;
    let catalog_path = config.output_path(&config.output.catalog);
    save_catalog(&catalog_path, matrix.catalog())
        .with_context(|| format!("write encoding catalog {}", catalog_path.display()))?;

    info!(
        rows = matrix.height(),
        features = matrix.width(),
        digest = %features.digest(),
        duration_ms = start.elapsed().as_millis(),
        "encode stage complete"
    );
    Ok(EncodeReport {
        rows: matrix.height(),
        variables: matrix.catalog().len(),
        features: matrix.width(),
        label_threshold: matrix.label_threshold(),
        dropped: imputed.dropped,
        pruned,
        top_correlations: ranking.into_iter().take(TOP_CORRELATIONS).collect(),
        encoded_path,
        features_path,
        catalog_path,
        correlations_path,
        level_summary_path,
    })
}

/// Types for merged columns, including file-qualified `variable.stem` names.
pub fn merged_column_types(
    table: &WideTable,
    registry: &VariableRegistry,
) -> BTreeMap<String, VariableType> {
    let by_variable = registry.types();
    table
        .column_names()
        .filter_map(|name| {
            if let Some(var_type) = by_variable.get(name) {
                return Some((name.to_string(), *var_type));
            }
            let (variable, stem) = name.rsplit_once('.')?;
            registry
                .iter()
                .find(|record| {
                    record.variable == variable
                        && Path::new(&record.source_file)
                            .file_stem()
                            .is_some_and(|s| s == stem)
                })
                .map(|record| (name.to_string(), record.var_type))
        })
        .collect()
}

pub fn run_screen(args: &StudyArgs) -> Result<ScreenReport> {
    let config = load_config(args)?;
    let cohort = cohort_stage(&config)?;
    screen_stage(&config, &cohort)
}

pub fn run_merge(args: &StudyArgs) -> Result<MergeReport> {
    let config = load_config(args)?;
    let registry_path = config.output_path(&config.output.registry);
    let registry = VariableRegistry::read_csv(&registry_path)
        .with_context(|| format!("read registry {}", registry_path.display()))?;
    let cohort = cohort_stage(&config)?;
    let (report, _, _) = merge_stage(&config, &cohort, &registry)?;
    Ok(report)
}

pub fn run_encode(args: &EncodeArgs) -> Result<EncodeReport> {
    let config = load_config(&args.study)?;
    let registry_path = config.output_path(&config.output.registry);
    let registry = VariableRegistry::read_csv(&registry_path)
        .with_context(|| format!("read registry {}", registry_path.display()))?;
    let merged_path = config.output_path(&config.output.merged);
    let table = WideTable::load(
        &merged_path,
        &config.source.subject_column,
        &config.cohort.outcome_name,
    )
    .with_context(|| format!("read merged table {}", merged_path.display()))?;
    let types = merged_column_types(&table, &registry);
    debug!(typed = types.len(), columns = table.width(), "resolved merged column types");
    encode_stage(&config, &table, &types, args)
}

/// All stages in order; the cohort is selected once.
pub fn run_all(args: &EncodeArgs) -> Result<RunReport> {
    let config = load_config(&args.study)?;
    let span = info_span!("run", config = %args.study.config.display());
    let _guard = span.enter();
    let start = Instant::now();

    let cohort = cohort_stage(&config)?;
    let screen = screen_stage(&config, &cohort)?;
    let (merge, table, types) = merge_stage(&config, &cohort, &screen.screening.registry)?;
    let encode = encode_stage(&config, &table, &types, args)?;

    info!(duration_ms = start.elapsed().as_millis(), "run complete");
    Ok(RunReport {
        screen,
        merge,
        encode,
    })
}

fn read_answers_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read answers {}", path.display()))?;
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&text)
        .with_context(|| format!("parse answers {}", path.display()))?;
    let mut answers = BTreeMap::new();
    for (variable, value) in raw {
        let value = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(text) => text,
            serde_json::Value::Number(number) => number.to_string(),
            serde_json::Value::Bool(flag) => u8::from(flag).to_string(),
            other => bail!("answer for '{variable}' must be a string or number, got {other}"),
        };
        answers.insert(variable, value);
    }
    Ok(answers)
}

/// Merge `--answers` and `--answer` inputs; the latter win.
pub fn collect_answers(args: &PredictArgs) -> Result<BTreeMap<String, String>> {
    let mut answers = match &args.answers_file {
        Some(path) => read_answers_file(path)?,
        None => BTreeMap::new(),
    };
    answers.extend(args.answers.iter().cloned());
    Ok(answers)
}

pub fn run_predict(args: &PredictArgs) -> Result<PredictReport> {
    let features = FeatureList::load(&args.features).context("load feature list")?;
    let catalog = load_catalog(&args.catalog).context("load encoding catalog")?;
    let model = LogisticModel::load(&args.model)
        .context("load model")?
        .bind(&features)
        .context("bind model to feature list")?;
    let answers = collect_answers(args)?;

    let adapter = ScoringAdapter::new(features, &catalog);
    let answered = answers
        .keys()
        .filter(|variable| adapter.variables().any(|v| v == variable.as_str()))
        .count();
    let prediction = adapter.predict(&model, &answers).context("score answers")?;
    info!(
        features = adapter.features().len(),
        answered,
        probability = prediction.positive_probability(),
        "prediction complete"
    );
    Ok(PredictReport {
        features: adapter.features().len(),
        answered,
        band: prediction.risk_band(),
        prediction,
    })
}
