use crate::core::models::job::StructureJob;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming the analyzer executable.
pub const PISA_EXE_VAR: &str = "PISA_EXE";
pub const DEFAULT_EXECUTABLE: &str = "pisa";

const STDERR_LIMIT: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerStage {
    Analyse,
    EmitReport,
    Erase,
}

impl fmt::Display for AnalyzerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerStage::Analyse => write!(f, "analyse"),
            AnalyzerStage::EmitReport => write!(f, "xml report"),
            AnalyzerStage::Erase => write!(f, "erase"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Failed to launch analyzer for {stage}: {source}")]
    Spawn {
        stage: AnalyzerStage,
        #[source]
        source: io::Error,
    },
    #[error("Analyzer {stage} step exited with {status}{}", stderr_suffix(.stderr))]
    ExitStatus {
        stage: AnalyzerStage,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Cannot create report file '{path}': {source}", path = path.display())]
    ReportFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Analyzer executable not found: {0}")]
    NotFound(String),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// The three operations the orchestrator needs from an interface analyzer.
///
/// Implementations must be safe to call from several worker threads at once for distinct
/// job identifiers.
pub trait Analyzer: Sync {
    fn analyse(&self, job: &StructureJob) -> Result<(), AnalyzerError>;

    /// Writes the interfaces report for an analysed job to `report_path`.
    fn emit_report(&self, job: &StructureJob, report_path: &Path) -> Result<(), AnalyzerError>;

    /// Discards the analyzer's session state for the job.
    fn erase(&self, job: &StructureJob) -> Result<(), AnalyzerError>;
}

/// [`Analyzer`] backed by the CCP4 `pisa` command-line program.
#[derive(Debug, Clone)]
pub struct PisaAnalyzer {
    executable: PathBuf,
}

impl PisaAnalyzer {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Locates the analyzer: an explicit path first, then `PISA_EXE`, then `pisa` on `PATH`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, AnalyzerError> {
        if let Some(path) = explicit {
            return locate(path).map(Self::new);
        }
        if let Some(value) = std::env::var_os(PISA_EXE_VAR).filter(|v| !v.is_empty()) {
            debug!(variable = PISA_EXE_VAR, "Resolving analyzer from environment.");
            return locate(Path::new(&value)).map(Self::new);
        }
        which::which(DEFAULT_EXECUTABLE)
            .map(Self::new)
            .map_err(|e| {
                AnalyzerError::NotFound(format!(
                    "'{}' is not on PATH and {} is unset ({})",
                    DEFAULT_EXECUTABLE, PISA_EXE_VAR, e
                ))
            })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self, job: &StructureJob) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(&job.identifier).stdin(Stdio::null());
        cmd
    }

    fn run(&self, stage: AnalyzerStage, mut cmd: Command) -> Result<(), AnalyzerError> {
        let output = cmd
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| AnalyzerError::Spawn { stage, source: e })?;
        if output.status.success() {
            return Ok(());
        }
        Err(AnalyzerError::ExitStatus {
            stage,
            status: output.status,
            stderr: truncate_stderr(&output.stderr),
        })
    }
}

fn locate(path: &Path) -> Result<PathBuf, AnalyzerError> {
    let is_bare_name = path.components().count() == 1 && !path.is_absolute();
    if is_bare_name && !path.exists() {
        return which::which(path)
            .map_err(|e| AnalyzerError::NotFound(format!("'{}' ({})", path.display(), e)));
    }
    if is_executable(path) {
        Ok(path.to_path_buf())
    } else {
        Err(AnalyzerError::NotFound(format!(
            "'{}' is not an executable file",
            path.display()
        )))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Keeps the tail of the analyzer's stderr, where the actual error usually is.
fn truncate_stderr(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.chars().count() <= STDERR_LIMIT {
        return text.to_string();
    }
    let tail: String = text
        .chars()
        .rev()
        .take(STDERR_LIMIT)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{}", tail)
}

impl Analyzer for PisaAnalyzer {
    fn analyse(&self, job: &StructureJob) -> Result<(), AnalyzerError> {
        let mut cmd = self.command(job);
        cmd.arg("-analyse")
            .arg(&job.structure_path)
            .stdout(Stdio::null());
        self.run(AnalyzerStage::Analyse, cmd)
    }

    fn emit_report(&self, job: &StructureJob, report_path: &Path) -> Result<(), AnalyzerError> {
        let file = File::create(report_path).map_err(|e| AnalyzerError::ReportFile {
            path: report_path.to_path_buf(),
            source: e,
        })?;
        let mut cmd = self.command(job);
        cmd.args(["-xml", "interfaces"]).stdout(Stdio::from(file));
        self.run(AnalyzerStage::EmitReport, cmd)
    }

    fn erase(&self, job: &StructureJob) -> Result<(), AnalyzerError> {
        let mut cmd = self.command(job);
        cmd.arg("-erase").stdout(Stdio::null());
        self.run(AnalyzerStage::Erase, cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn truncate_stderr_keeps_tail() {
        let long = "x".repeat(STDERR_LIMIT) + "the real error";
        let truncated = truncate_stderr(long.as_bytes());
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("the real error"));
        assert_eq!(truncated.chars().count(), STDERR_LIMIT + 3);
        assert_eq!(truncate_stderr(b"  short\n"), "short");
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-pisa");
        assert!(matches!(
            PisaAnalyzer::resolve(Some(missing.as_path())),
            Err(AnalyzerError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn explicit_path_must_be_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let script = dir.path().join("pisa");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(PisaAnalyzer::resolve(Some(script.as_path())).is_err());

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let analyzer = PisaAnalyzer::resolve(Some(script.as_path())).unwrap();
        assert_eq!(analyzer.executable(), script.as_path());
    }

    #[cfg(unix)]
    #[test]
    fn failing_step_reports_stage_and_stderr() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let script = dir.path().join("pisa");
        std::fs::write(&script, "#!/bin/sh\necho 'session locked' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let analyzer = PisaAnalyzer::new(&script);
        let job = StructureJob::new("d1", dir.path().join("d1.pdb"));
        let err = analyzer.analyse(&job).unwrap_err();
        match &err {
            AnalyzerError::ExitStatus { stage, stderr, .. } => {
                assert_eq!(*stage, AnalyzerStage::Analyse);
                assert_eq!(stderr, "session locked");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("analyse step exited"));
    }

    #[cfg(unix)]
    #[test]
    fn emit_report_redirects_stdout_into_report_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let script = dir.path().join("pisa");
        std::fs::write(&script, "#!/bin/sh\necho \"<pisa_interfaces id='$1'/>\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let analyzer = PisaAnalyzer::new(&script);
        let job = StructureJob::new("d7", dir.path().join("d7.pdb"));
        let report = dir.path().join("d7.xml");
        analyzer.emit_report(&job, &report).unwrap();
        let text = std::fs::read_to_string(&report).unwrap();
        assert_eq!(text.trim(), "<pisa_interfaces id='d7'/>");
    }
}
