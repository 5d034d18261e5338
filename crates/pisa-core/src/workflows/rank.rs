use crate::core::io::tables::{read_contacts_path, write_ranked_path};
use crate::core::ranking::{Ranking, RankingConfig, rank};
use crate::engine::error::EngineError;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const RANKED_ALL_FILE: &str = "ranked_all.csv";
pub const RANKED_NO_OVERLAP_FILE: &str = "ranked_no_overlap.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct RankOutputs {
    pub all: PathBuf,
    pub no_overlap: PathBuf,
}

/// Ranks a contacts table and writes `ranked_all.csv` and `ranked_no_overlap.csv`.
#[instrument(skip_all, name = "ranking_workflow", fields(input = %contacts_path.display()))]
pub fn run(
    contacts_path: &Path,
    output_dir: &Path,
    config: &RankingConfig,
) -> Result<(Ranking, RankOutputs), EngineError> {
    config.validate()?;
    let rows = read_contacts_path(contacts_path)?;
    info!(
        rows = rows.len(),
        normalization = %config.normalization,
        overlap_penalty = config.overlap_penalty,
        "Ranking structures."
    );
    let ranking = rank(rows, config)?;

    std::fs::create_dir_all(output_dir).map_err(|e| EngineError::Io {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    let outputs = RankOutputs {
        all: output_dir.join(RANKED_ALL_FILE),
        no_overlap: output_dir.join(RANKED_NO_OVERLAP_FILE),
    };
    write_ranked_path(&outputs.all, &ranking.all, "rank")?;
    write_ranked_path(&outputs.no_overlap, &ranking.no_overlap, "rank_no_overlap")?;

    info!(
        ranked = ranking.all.len(),
        without_overlap = ranking.no_overlap.len(),
        "Ranking workflow complete."
    );
    Ok((ranking, outputs))
}
