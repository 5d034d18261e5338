use std::path::{Path, PathBuf};

/// One structure file queued for analysis.
///
/// The identifier doubles as the analyzer session name and the stem of the report file,
/// so it must be unique within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureJob {
    pub identifier: String,
    pub structure_path: PathBuf,
    pub chain_id: Option<String>,
    pub residue_floor: Option<i64>,
}

impl StructureJob {
    pub fn new(identifier: impl Into<String>, structure_path: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            structure_path: structure_path.into(),
            chain_id: None,
            residue_floor: None,
        }
    }

    /// Builds a job whose identifier is the file stem of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self::new(stem, path))
    }

    pub fn with_chain(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    pub fn with_residue_floor(mut self, floor: i64) -> Self {
        self.residue_floor = Some(floor);
        self
    }

    pub fn report_file_name(&self) -> String {
        format!("{}.xml", self.identifier)
    }
}
