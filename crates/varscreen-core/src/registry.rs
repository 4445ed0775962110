//! The accepted-variable registry.
//!
//! The registry is written once per screening run and read back by the merge
//! stage, so it round-trips through CSV with one row per accepted variable.

use std::collections::BTreeMap;
use std::path::Path;

use varscreen_model::{VariableRecord, VariableType};

use crate::error::{PipelineError, Result};

/// Accepted variables of one (domain, file) pair, in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGroup<'a> {
    pub domain: &'a str,
    pub source_file: &'a str,
    pub records: Vec<&'a VariableRecord>,
}

impl SourceGroup<'_> {
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.variable.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRegistry {
    records: Vec<VariableRecord>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<VariableRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: VariableRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = VariableRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[VariableRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariableRecord> {
        self.records.iter()
    }

    /// Records grouped by (domain, file) in order of first appearance.
    pub fn by_source(&self) -> Vec<SourceGroup<'_>> {
        let mut groups: Vec<SourceGroup<'_>> = Vec::new();
        let mut positions: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for record in &self.records {
            let key = (record.domain.as_str(), record.source_file.as_str());
            let idx = *positions.entry(key).or_insert_with(|| {
                groups.push(SourceGroup {
                    domain: key.0,
                    source_file: key.1,
                    records: Vec::new(),
                });
                groups.len() - 1
            });
            groups[idx].records.push(record);
        }
        groups
    }

    /// Accepted-variable count per domain, in order of first appearance.
    pub fn domain_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.records {
            match counts.iter_mut().find(|(domain, _)| *domain == record.domain) {
                Some((_, count)) => *count += 1,
                None => counts.push((record.domain.clone(), 1)),
            }
        }
        counts
    }

    /// Records ordered by (domain, file); order within a file is kept.
    pub fn sorted_for_display(&self) -> Vec<&VariableRecord> {
        let mut sorted: Vec<&VariableRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| {
            (a.domain.as_str(), a.source_file.as_str())
                .cmp(&(b.domain.as_str(), b.source_file.as_str()))
        });
        sorted
    }

    /// Variable name → type. When two files share a name, the first wins.
    pub fn types(&self) -> BTreeMap<String, VariableType> {
        let mut types = BTreeMap::new();
        for record in &self.records {
            types
                .entry(record.variable.clone())
                .or_insert(record.var_type);
        }
        types
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Ingest(varscreen_ingest::IngestError::FileWrite {
                    path: parent.to_path_buf(),
                    source: e,
                })
            })?;
        }
        let csv_err = |source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for record in &self.records {
            writer.serialize(record).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| csv_err(e.into()))?;
        tracing::info!(
            path = %path.display(),
            variables = self.records.len(),
            "Wrote variable registry"
        );
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::MissingSource {
                what: "variable registry".to_string(),
                path: path.to_path_buf(),
            });
        }
        let csv_err = |source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let records = reader
            .deserialize::<VariableRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        Ok(Self { records })
    }
}

impl<'a> IntoIterator for &'a VariableRegistry {
    type Item = &'a VariableRecord;
    type IntoIter = std::slice::Iter<'a, VariableRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
