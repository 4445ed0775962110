//! Spearman correlation ranking, collinearity pruning, and the
//! low-cardinality level summary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encode::sorted_levels;
use crate::error::{PipelineError, Result};
use crate::merge::WideTable;

/// Spearman correlation of one variable with the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCorrelation {
    pub variable: String,
    pub rho: f64,
    /// Pairwise complete observations used.
    pub n: usize,
}

/// A variable removed for being collinear with a kept one.
#[derive(Debug, Clone, PartialEq)]
pub struct CollinearDrop {
    pub dropped: String,
    pub kept: String,
    pub rho: f64,
}

/// Distinct values of a variable with few levels.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    pub variable: String,
    /// Numeric-aware order.
    pub levels: Vec<String>,
}

impl LevelSummary {
    pub fn n_unique(&self) -> usize {
        self.levels.len()
    }
}

#[derive(Debug, Clone)]
pub struct PruneOutcome {
    pub table: WideTable,
    pub dropped: Vec<CollinearDrop>,
}

/// Average ranks (1-based); ties share the mean of their positions.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman's rho over pairwise complete observations.
///
/// `None` when fewer than two pairs remain or either side is constant.
pub fn spearman(x: &[Option<f64>], y: &[Option<f64>]) -> Option<(f64, usize)> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let rho = pearson(&average_ranks(&xs), &average_ranks(&ys))?;
    Some((rho, xs.len()))
}

fn numeric_columns(table: &WideTable) -> Vec<(&str, Vec<Option<f64>>)> {
    table
        .columns()
        .iter()
        .filter(|column| column.is_numeric())
        .map(|column| (column.name.as_str(), column.numbers()))
        .collect()
}

/// Correlation of each numeric column with the outcome, strongest first.
pub fn rank_by_target(table: &WideTable) -> Vec<TargetCorrelation> {
    let target: Vec<Option<f64>> = table.outcome().iter().copied().map(Some).collect();
    let mut ranked: Vec<TargetCorrelation> = numeric_columns(table)
        .into_iter()
        .filter_map(|(name, values)| {
            spearman(&values, &target).map(|(rho, n)| TargetCorrelation {
                variable: name.to_string(),
                rho,
                n,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.rho.abs().total_cmp(&a.rho.abs()));
    ranked
}

/// Drop one member of every pair with |rho| above `threshold`.
///
/// The member less correlated with the outcome goes; on a tie the earlier
/// column stays. Non-numeric columns are kept untouched.
pub fn prune_collinear(table: &WideTable, threshold: f64) -> Result<PruneOutcome> {
    let target: Vec<Option<f64>> = table.outcome().iter().copied().map(Some).collect();
    let numeric = numeric_columns(table);
    let strength: Vec<f64> = numeric
        .iter()
        .map(|(_, values)| spearman(values, &target).map_or(0.0, |(rho, _)| rho.abs()))
        .collect();

    let mut removed = vec![false; numeric.len()];
    let mut dropped = Vec::new();
    for i in 0..numeric.len() {
        if removed[i] {
            continue;
        }
        for j in (i + 1)..numeric.len() {
            if removed[j] {
                continue;
            }
            let Some((rho, _)) = spearman(&numeric[i].1, &numeric[j].1) else {
                continue;
            };
            if rho.abs() <= threshold {
                continue;
            }
            let (loser, winner) = if strength[j] > strength[i] { (i, j) } else { (j, i) };
            removed[loser] = true;
            debug!(
                dropped = numeric[loser].0,
                kept = numeric[winner].0,
                rho,
                "collinear variable dropped"
            );
            dropped.push(CollinearDrop {
                dropped: numeric[loser].0.to_string(),
                kept: numeric[winner].0.to_string(),
                rho,
            });
            if loser == i {
                break;
            }
        }
    }

    let removed_names: Vec<&str> = numeric
        .iter()
        .zip(&removed)
        .filter(|(_, gone)| **gone)
        .map(|((name, _), _)| *name)
        .collect();
    let kept = table
        .columns()
        .iter()
        .filter(|column| !removed_names.contains(&column.name.as_str()))
        .cloned()
        .collect();
    let pruned = table.with_columns(kept)?;

    info!(
        threshold,
        dropped = dropped.len(),
        remaining = pruned.width(),
        "collinearity pruning complete"
    );
    Ok(PruneOutcome {
        table: pruned,
        dropped,
    })
}

/// Variables with at most `max_levels` distinct non-missing values, in
/// column order.
pub fn summarize_levels(table: &WideTable, max_levels: usize) -> Vec<LevelSummary> {
    table
        .columns()
        .iter()
        .filter_map(|column| {
            let levels = sorted_levels(&column.values);
            (levels.len() <= max_levels).then(|| LevelSummary {
                variable: column.name.clone(),
                levels,
            })
        })
        .collect()
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            PipelineError::Ingest(varscreen_ingest::IngestError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })
        })?;
    }
    Ok(())
}

/// Persist a correlation ranking as CSV (`variable,rho,n`).
pub fn write_correlations(path: &Path, ranking: &[TargetCorrelation]) -> Result<()> {
    create_parent(path)?;
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in ranking {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

/// Persist a level summary as CSV (`variable,n_unique,unique_values`).
///
/// Levels are joined with `"; "`.
pub fn write_level_summary(path: &Path, summary: &[LevelSummary]) -> Result<()> {
    create_parent(path)?;
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record(["variable", "n_unique", "unique_values"])
        .map_err(csv_err)?;
    for entry in summary {
        let n_unique = entry.n_unique().to_string();
        let levels = entry.levels.join("; ");
        writer
            .write_record([entry.variable.as_str(), n_unique.as_str(), levels.as_str()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    debug!(path = %path.display(), variables = summary.len(), "wrote level summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::Cohort;
    use crate::merge::WideColumn;
    use varscreen_model::RawValue;

    fn table() -> WideTable {
        let outcome = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let cohort = Cohort::from_pairs(
            "y",
            outcome.iter().enumerate().map(|(i, y)| (format!("S{i}"), *y)),
        );
        let mut table = WideTable::from_cohort(&cohort, "src_subject_id");
        let column = |name: &str, values: [f64; 6]| {
            WideColumn::new(name, values.into_iter().map(RawValue::Number).collect())
        };
        // `weak` and `strong` are collinear; `strong` follows the outcome more closely.
        table.push_column(column("weak", [2.0, 1.0, 4.0, 3.0, 6.0, 5.0])).unwrap();
        table.push_column(column("strong", [1.0, 2.0, 3.0, 4.0, 6.0, 5.0])).unwrap();
        table.push_column(column("noise", [3.0, 1.0, 2.0, 3.0, 1.0, 2.0])).unwrap();
        table
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn spearman_is_one_for_monotone_pairs() {
        let x = [Some(1.0), Some(2.0), None, Some(4.0)];
        let y = [Some(10.0), Some(100.0), Some(5.0), Some(1000.0)];
        let (rho, n) = spearman(&x, &y).unwrap();
        assert!((rho - 1.0).abs() < 1e-12);
        assert_eq!(n, 3);
    }

    #[test]
    fn keeps_variable_closer_to_outcome() {
        let table = table();
        let ranking = rank_by_target(&table);
        assert_eq!(ranking[0].variable, "strong");

        let outcome = prune_collinear(&table, 0.8).unwrap();
        let remaining: Vec<&str> = outcome.table.column_names().collect();
        assert_eq!(remaining, vec!["strong", "noise"]);
        assert_eq!(outcome.dropped[0].dropped, "weak");
        assert_eq!(outcome.dropped[0].kept, "strong");
    }

    #[test]
    fn level_summary_lists_low_cardinality_columns() {
        let table = table();
        let summary = summarize_levels(&table, 3);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].variable, "noise");
        assert_eq!(summary[0].levels, vec!["1", "2", "3"]);
        assert_eq!(summary[0].n_unique(), 3);
        assert_eq!(summarize_levels(&table, 6).len(), 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("levels.csv");
        write_level_summary(&path, &summary).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "variable,n_unique,unique_values\nnoise,3,1; 2; 3\n");
    }
}
