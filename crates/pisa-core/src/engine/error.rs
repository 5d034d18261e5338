use std::path::PathBuf;
use thiserror::Error;

use super::analyzer::AnalyzerError;
use super::config::ConfigError;
use super::orchestrator::JobFailure;
use crate::core::io::report::ReportError;
use crate::core::io::settings::SettingsError;
use crate::core::io::tables::TableError;
use crate::core::ranking::RankingError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Duplicate structure identifier '{0}' in batch")]
    DuplicateJob(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    #[error("I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Batch stopped after '{identifier}' failed: {reason}")]
    FailFast {
        identifier: String,
        reason: JobFailure,
    },
}
