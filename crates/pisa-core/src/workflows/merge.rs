use crate::core::io::tables::{read_contacts_path, read_metadata_path};
use crate::engine::aggregate::{JoinMode, JoinedTable, MetricsTable};
use crate::engine::error::EngineError;
use std::path::Path;
use tracing::{info, instrument};

pub const DEFAULT_KEY_COLUMN: &str = "description";

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    pub key_column: String,
    pub delimiter: u8,
    pub mode: JoinMode,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            delimiter: b',',
            mode: JoinMode::Inner,
        }
    }
}

/// Joins a contacts table with sequence metadata and writes the merged table to `output`.
#[instrument(skip_all, name = "merge_workflow", fields(contacts = %contacts_path.display()))]
pub fn run(
    contacts_path: &Path,
    metadata_path: &Path,
    output: &Path,
    options: &MergeOptions,
) -> Result<JoinedTable, EngineError> {
    let table = MetricsTable::from_rows(read_contacts_path(contacts_path)?);
    let metadata = read_metadata_path(metadata_path, &options.key_column, options.delimiter)?;
    info!(
        structures = table.len(),
        metadata_rows = metadata.len(),
        key = %options.key_column,
        "Merging contacts with metadata."
    );

    let joined = table.join(&metadata, options.mode);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    joined.write_path(output)?;
    Ok(joined)
}
