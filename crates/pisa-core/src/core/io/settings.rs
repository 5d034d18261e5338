use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error for settings file '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Settings are missing required key '{0}'")]
    MissingKey(&'static str),
    #[error("Invalid value for '{key}': '{value}' (expected an integer >= 1)")]
    InvalidValue { key: String, value: String },
}

/// Concurrency limits read from a resource settings file.
///
/// The file holds `key: value` lines. `max_workers` is required, `batch_size` optional;
/// comments (`#`), blank lines and unknown keys are ignored so an estimator report can be
/// consumed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSettings {
    pub max_workers: usize,
    pub batch_size: Option<usize>,
}

fn positive(key: &str, value: &str) -> Result<usize, SettingsError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

impl ResourceSettings {
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let mut max_workers = None;
        let mut batch_size = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                debug!(line, "Ignoring settings line without a key.");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "max_workers" => max_workers = Some(positive(key, value)?),
                "batch_size" => batch_size = Some(positive(key, value)?),
                _ => {}
            }
        }

        Ok(Self {
            max_workers: max_workers.ok_or(SettingsError::MissingKey("max_workers"))?,
            batch_size,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Renders the settings, preceded by `notes` as `#` comment lines.
    pub fn render(&self, notes: &[String]) -> String {
        let mut out = String::new();
        for note in notes {
            let _ = writeln!(out, "# {}", note);
        }
        let _ = writeln!(out, "max_workers: {}", self.max_workers);
        if let Some(batch) = self.batch_size {
            let _ = writeln!(out, "batch_size: {}", batch);
        }
        out
    }

    pub fn write_to(&self, path: &Path, notes: &[String]) -> Result<(), SettingsError> {
        std::fs::write(path, self.render(notes)).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
