use crate::core::models::metrics::StructureMetrics;
use crate::core::ranking::RankedRow;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Header of the contacts table, in column order.
pub const CONTACT_COLUMNS: [&str; 13] = [
    "binder",
    "bsa_score",
    "salt_bridges",
    "h_bonds",
    "interface_count",
    "interface_area_A2",
    "dg_dissociation",
    "solvation_energy_gain",
    "overlap",
    "specificity",
    "interface_residue_count",
    "pct_polar",
    "pct_hydrophobic",
];

/// Columns a contacts table must carry to be ranked.
const RANKING_COLUMNS: [&str; 9] = [
    "binder",
    "bsa_score",
    "salt_bridges",
    "h_bonds",
    "interface_area_A2",
    "dg_dissociation",
    "solvation_energy_gain",
    "overlap",
    "specificity",
];

pub const FAILURE_COLUMNS: [&str; 2] = ["binder", "reason"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error for '{path}': {source}", path = path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Table '{path}' has no '{column}' column", path = path.display())]
    MissingColumn { path: PathBuf, column: String },
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> TableError + '_ {
    move |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn fixed(value: Option<f64>, decimals: usize) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_default()
}

/// Formats one metrics row as contacts-table cells; undefined values become blank cells.
pub fn metrics_fields(m: &StructureMetrics) -> Vec<String> {
    vec![
        m.identifier.clone(),
        m.bsa_score.to_string(),
        m.salt_bridges.to_string(),
        m.hydrogen_bonds.to_string(),
        m.interface_count.to_string(),
        fixed(m.interface_area, 2),
        fixed(m.dg_dissociation, 2),
        fixed(m.solvation_energy_gain, 3),
        m.overlap.clone().unwrap_or_default(),
        fixed(m.specificity, 3),
        m.interface_residue_count.to_string(),
        fixed(m.pct_polar, 2),
        fixed(m.pct_hydrophobic, 2),
    ]
}

pub fn write_contacts<W: io::Write>(out: W, rows: &[StructureMetrics]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CONTACT_COLUMNS)?;
    for row in rows {
        writer.write_record(metrics_fields(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_contacts_path(path: &Path, rows: &[StructureMetrics]) -> Result<(), TableError> {
    let file = create(path)?;
    write_contacts(file, rows).map_err(csv_error(path))
}

/// Writes ranked rows in the order given, followed by `score` and the rank column.
pub fn write_ranked_path(path: &Path, rows: &[RankedRow], rank_column: &str) -> Result<(), TableError> {
    let file = create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    let header = CONTACT_COLUMNS
        .iter()
        .copied()
        .chain(["score", rank_column]);
    writer.write_record(header).map_err(csv_error(path))?;
    for row in rows {
        let mut fields = metrics_fields(&row.metrics);
        fields.push(fixed(row.score, 6));
        fields.push(row.rank.to_string());
        writer.write_record(&fields).map_err(csv_error(path))?;
    }
    writer
        .flush()
        .map_err(|e| TableError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

pub fn write_failures_path(path: &Path, failures: &[(String, String)]) -> Result<(), TableError> {
    let file = create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(FAILURE_COLUMNS).map_err(csv_error(path))?;
    for (identifier, reason) in failures {
        writer
            .write_record([identifier, reason])
            .map_err(csv_error(path))?;
    }
    writer.flush().map_err(|e| TableError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn create(path: &Path) -> Result<std::fs::File, TableError> {
    std::fs::File::create(path).map_err(|e| TableError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, Deserialize)]
struct ContactRecord {
    binder: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bsa_score: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    salt_bridges: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    h_bonds: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    interface_count: Option<u32>,
    #[serde(rename = "interface_area_A2", default, deserialize_with = "csv::invalid_option")]
    interface_area: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    dg_dissociation: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    solvation_energy_gain: Option<f64>,
    #[serde(default)]
    overlap: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    specificity: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    interface_residue_count: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pct_polar: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pct_hydrophobic: Option<f64>,
}

impl From<ContactRecord> for StructureMetrics {
    fn from(r: ContactRecord) -> Self {
        StructureMetrics {
            identifier: r.binder,
            bsa_score: r.bsa_score.unwrap_or(0),
            salt_bridges: r.salt_bridges.unwrap_or(0),
            hydrogen_bonds: r.h_bonds.unwrap_or(0),
            interface_count: r.interface_count.unwrap_or(0),
            interface_area: r.interface_area,
            dg_dissociation: r.dg_dissociation,
            solvation_energy_gain: r.solvation_energy_gain,
            overlap: r.overlap.filter(|o| !o.trim().is_empty()),
            specificity: r.specificity,
            interface_residue_count: r.interface_residue_count.unwrap_or(0),
            pct_polar: r.pct_polar,
            pct_hydrophobic: r.pct_hydrophobic,
        }
    }
}

/// Reads a contacts table written by [`write_contacts`] (or an equivalent merged table).
///
/// Extra columns are ignored. Blank or unparsable counts read as 0 and blank or unparsable
/// measurements as missing.
pub fn read_contacts_path(path: &Path) -> Result<Vec<StructureMetrics>, TableError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error(path))?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();
    for column in RANKING_COLUMNS {
        if !headers.iter().any(|h| h.trim() == column) {
            return Err(TableError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    reader
        .deserialize::<ContactRecord>()
        .map(|record| record.map(StructureMetrics::from).map_err(csv_error(path)))
        .collect()
}

/// Per-design sequence metadata keyed by one of its columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceMetadata {
    pub key_column: String,
    /// Non-key column names, in file order.
    pub columns: Vec<String>,
    pub rows: HashMap<String, Vec<String>>,
}

impl SequenceMetadata {
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a delimited metadata table, keying rows by `key_column`.
///
/// Later rows repeating a key are dropped with a warning.
pub fn read_metadata_path(
    path: &Path,
    key_column: &str,
    delimiter: u8,
) -> Result<SequenceMetadata, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error(path))?;
    let headers = reader.headers().map_err(csv_error(path))?.clone();
    let key_index = headers
        .iter()
        .position(|h| h.trim() == key_column)
        .ok_or_else(|| TableError::MissingColumn {
            path: path.to_path_buf(),
            column: key_column.to_string(),
        })?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != key_index)
        .map(|(_, h)| h.trim().to_string())
        .collect();

    let mut rows = HashMap::new();
    let mut duplicates = 0usize;
    for record in reader.records() {
        let record = record.map_err(csv_error(path))?;
        let key = record.get(key_index).unwrap_or_default().trim().to_string();
        if key.is_empty() {
            continue;
        }
        let values: Vec<String> = (0..headers.len())
            .filter(|i| *i != key_index)
            .map(|i| record.get(i).unwrap_or_default().to_string())
            .collect();
        if rows.contains_key(&key) {
            duplicates += 1;
            continue;
        }
        rows.insert(key, values);
    }
    if duplicates > 0 {
        warn!(
            path = %path.display(),
            duplicates,
            "Metadata repeats some keys; keeping the first occurrence."
        );
    }

    Ok(SequenceMetadata {
        key_column: key_column.to_string(),
        columns,
        rows,
    })
}
