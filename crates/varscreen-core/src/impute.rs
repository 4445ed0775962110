//! Missing-value imputation.
//!
//! Sentinels are scrubbed first, then each column is filled by type:
//! discrete types take the mode, continuous takes the mean. Ordinal follows
//! [`OrdinalImputation`].

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};
use varscreen_model::{
    EncodingOptions, OrdinalImputation, RawValue, SentinelSet, VariableType, compare_keys,
};

use crate::error::Result;
use crate::merge::{WideColumn, WideTable};

/// Why a column was left out of the imputed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No valid value left after scrubbing sentinels.
    NoValidValues,
    /// Declared low-variance, unknown or excluded.
    UnusableType(VariableType),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidValues => f.write_str("no valid values"),
            Self::UnusableType(var_type) => write!(f, "unusable type {var_type}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedColumn {
    pub name: String,
    pub reason: DropReason,
}

/// Fill rule resolved for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FillRule {
    Mode(RawValue),
    Mean(f64),
}

impl FillRule {
    pub fn value(&self) -> RawValue {
        match self {
            Self::Mode(value) => value.clone(),
            Self::Mean(mean) => RawValue::Number(*mean),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Imputed {
    /// Imputed table; no cell is missing.
    pub table: WideTable,
    /// Type of every surviving column, declared or inferred.
    pub types: BTreeMap<String, VariableType>,
    pub fills: BTreeMap<String, FillRule>,
    pub dropped: Vec<DroppedColumn>,
}

/// Type for a column without a declared type.
pub fn infer_type(values: &[RawValue], options: &EncodingOptions) -> VariableType {
    let mut keys: Vec<String> = values.iter().filter_map(RawValue::key).collect();
    keys.sort();
    keys.dedup();
    let numeric = values
        .iter()
        .all(|v| v.is_missing() || v.as_number().is_some());
    if numeric && keys.len() > options.fallback_discrete_levels {
        VariableType::Continuous
    } else {
        VariableType::Categorical
    }
}

/// Most frequent value; ties go to the smallest key.
pub fn mode(values: &[RawValue]) -> Option<RawValue> {
    let mut counts: BTreeMap<String, (usize, &RawValue)> = BTreeMap::new();
    for value in values {
        if let Some(key) = value.key() {
            counts.entry(key).or_insert((0, value)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(ka, (ca, _)), (kb, (cb, _))| ca.cmp(cb).then_with(|| compare_keys(kb, ka)))
        .map(|(_, (_, value))| value.clone())
}

/// Mean of the numeric cells.
pub fn mean(values: &[RawValue]) -> Option<f64> {
    let numbers: Vec<f64> = values.iter().filter_map(RawValue::as_number).collect();
    if numbers.is_empty() {
        None
    } else {
        Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }
}

fn fill_rule(var_type: VariableType, values: &[RawValue], options: &EncodingOptions) -> Option<FillRule> {
    let use_mean = match var_type {
        VariableType::Continuous => true,
        VariableType::Ordinal => options.ordinal_imputation == OrdinalImputation::Mean,
        _ => false,
    };
    if use_mean {
        mean(values).map(FillRule::Mean)
    } else {
        mode(values).map(FillRule::Mode)
    }
}

/// Scrub sentinels and fill every missing cell.
pub fn impute(
    table: &WideTable,
    types: &BTreeMap<String, VariableType>,
    sentinels: &SentinelSet,
    options: &EncodingOptions,
) -> Result<Imputed> {
    let mut columns = Vec::with_capacity(table.width());
    let mut resolved = BTreeMap::new();
    let mut fills = BTreeMap::new();
    let mut dropped = Vec::new();
    let mut filled_cells = 0usize;

    for column in table.columns() {
        let scrubbed: Vec<RawValue> = column.values.iter().map(|v| sentinels.scrub(v)).collect();
        let var_type = types
            .get(&column.name)
            .copied()
            .unwrap_or_else(|| infer_type(&scrubbed, options));

        if !var_type.is_usable() {
            warn!(variable = %column.name, var_type = %var_type, "column dropped before imputation");
            dropped.push(DroppedColumn {
                name: column.name.clone(),
                reason: DropReason::UnusableType(var_type),
            });
            continue;
        }

        // Text in a continuous column cannot be averaged; treat it as missing.
        let scrubbed: Vec<RawValue> = if var_type == VariableType::Continuous {
            scrubbed
                .into_iter()
                .map(|v| match v {
                    RawValue::Text(_) => RawValue::Missing,
                    other => other,
                })
                .collect()
        } else {
            scrubbed
        };

        let Some(rule) = fill_rule(var_type, &scrubbed, options) else {
            warn!(variable = %column.name, "column dropped: no valid values");
            dropped.push(DroppedColumn {
                name: column.name.clone(),
                reason: DropReason::NoValidValues,
            });
            continue;
        };

        let fill = rule.value();
        let mut missing = 0usize;
        let values: Vec<RawValue> = scrubbed
            .into_iter()
            .map(|v| {
                if v.is_missing() {
                    missing += 1;
                    fill.clone()
                } else {
                    v
                }
            })
            .collect();
        debug!(variable = %column.name, var_type = %var_type, missing, fill = %fill, "imputed column");
        filled_cells += missing;

        resolved.insert(column.name.clone(), var_type);
        fills.insert(column.name.clone(), rule);
        columns.push(WideColumn::new(column.name.clone(), values));
    }

    let imputed = table.with_columns(columns)?;
    info!(
        columns = imputed.width(),
        dropped = dropped.len(),
        filled_cells,
        "imputation complete"
    );
    Ok(Imputed {
        table: imputed,
        types: resolved,
        fills,
        dropped,
    })
}
