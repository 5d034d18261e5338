use super::orchestrator::BatchOutcome;
use crate::core::io::tables::{CONTACT_COLUMNS, SequenceMetadata, TableError, metrics_fields};
use crate::core::models::metrics::StructureMetrics;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Metric rows keyed by structure identifier, independent of arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    rows: BTreeMap<String, StructureMetrics>,
}

impl MetricsTable {
    /// Builds the table; a repeated identifier keeps its first row.
    pub fn from_rows(rows: impl IntoIterator<Item = StructureMetrics>) -> Self {
        let mut table = BTreeMap::new();
        for row in rows {
            if table.contains_key(&row.identifier) {
                warn!(identifier = %row.identifier, "Duplicate metrics row dropped.");
                continue;
            }
            table.insert(row.identifier.clone(), row);
        }
        Self { rows: table }
    }

    /// Successful outcomes, plus placeholder rows for failures when `placeholders` is set.
    pub fn from_outcome(outcome: &BatchOutcome, placeholders: bool) -> Self {
        Self::from_rows(outcome.outcomes.iter().filter_map(|o| match &o.result {
            Ok(metrics) => Some(metrics.clone()),
            Err(_) if placeholders => Some(StructureMetrics::placeholder(&o.job.identifier)),
            Err(_) => None,
        }))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&StructureMetrics> {
        self.rows.get(identifier)
    }

    pub fn rows(&self) -> impl Iterator<Item = &StructureMetrics> {
        self.rows.values()
    }

    pub fn into_rows(self) -> Vec<StructureMetrics> {
        self.rows.into_values().collect()
    }

    pub fn join(&self, metadata: &SequenceMetadata, mode: JoinMode) -> JoinedTable {
        let mut rows = Vec::with_capacity(self.rows.len());
        let mut dropped = 0;
        let mut unmatched = 0;

        for metrics in self.rows.values() {
            match metadata.get(&metrics.identifier) {
                Some(values) => rows.push(JoinedRow {
                    metrics: metrics.clone(),
                    metadata: Some(values.to_vec()),
                }),
                None => {
                    unmatched += 1;
                    match mode {
                        JoinMode::Inner => dropped += 1,
                        JoinMode::Left => rows.push(JoinedRow {
                            metrics: metrics.clone(),
                            metadata: None,
                        }),
                    }
                }
            }
        }

        if dropped > 0 {
            warn!(
                dropped,
                key = %metadata.key_column,
                "Structures without matching metadata were dropped from the merge."
            );
        }
        info!(rows = rows.len(), unmatched, "Joined metrics with metadata.");

        JoinedTable {
            metadata_columns: metadata.columns.clone(),
            rows,
            dropped,
            unmatched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub metrics: StructureMetrics,
    pub metadata: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    pub metadata_columns: Vec<String>,
    pub rows: Vec<JoinedRow>,
    /// Rows removed by an inner join.
    pub dropped: usize,
    /// Rows with no metadata match, whatever the join mode.
    pub unmatched: usize,
}

impl JoinedTable {
    /// Writes contacts columns followed by the metadata columns.
    pub fn write_path(&self, path: &Path) -> Result<(), TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        let header = CONTACT_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.metadata_columns.iter().cloned());
        writer.write_record(header).map_err(csv_err)?;

        let width = self.metadata_columns.len();
        for row in &self.rows {
            let mut fields = metrics_fields(&row.metrics);
            match &row.metadata {
                Some(values) => {
                    fields.extend(values.iter().cloned());
                    fields.resize(CONTACT_COLUMNS.len() + width, String::new());
                }
                None => fields.extend(std::iter::repeat_n(String::new(), width)),
            }
            writer.write_record(&fields).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| TableError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
