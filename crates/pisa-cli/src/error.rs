use pisabatch::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("No structure was analysed successfully ({failed} of {processed} failed)")]
    NothingSucceeded { processed: usize, failed: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Usage and configuration problems exit with 2, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::Argument(_)
            | CliError::FileParsing { .. }
            | CliError::Core(EngineError::Config(_))
            | CliError::Core(EngineError::Settings(_))
            | CliError::Core(EngineError::Ranking(_))
            | CliError::Core(EngineError::DuplicateJob(_)) => 2,
            _ => 1,
        }
    }
}
