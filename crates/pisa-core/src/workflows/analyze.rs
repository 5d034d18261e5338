use crate::core::io::tables::{write_contacts_path, write_failures_path};
use crate::core::models::job::StructureJob;
use crate::engine::aggregate::MetricsTable;
use crate::engine::analyzer::Analyzer;
use crate::engine::error::EngineError;
use crate::engine::orchestrator::{BatchOrchestrator, CancellationToken, JobFailure};
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const CONTACTS_FILE: &str = "contacts.csv";
pub const FAILURES_FILE: &str = "failures.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutputs {
    pub contacts: PathBuf,
    pub failures: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub table: MetricsTable,
    pub failures: Vec<(String, JobFailure)>,
    pub outputs: AnalysisOutputs,
}

impl AnalysisSummary {
    /// A run succeeds when at least one structure produced metrics.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }
}

/// Lists structure files in `dir` with the given extension (case-insensitive), sorted by path.
pub fn discover_structures(dir: &Path, extension: &str) -> Result<Vec<StructureJob>, EngineError> {
    let io_err = |e| EngineError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    let wanted = extension.trim_start_matches('.');
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .iter()
        .filter_map(|p| {
            let job = StructureJob::from_path(p);
            if job.is_none() {
                warn!(path = %p.display(), "Skipping structure file without a usable name.");
            }
            job
        })
        .collect())
}

/// Runs the batch and writes `contacts.csv` and `failures.csv` into `output_dir`.
///
/// Failed structures are left out of the contacts table unless `placeholder_rows` is set.
#[instrument(skip_all, name = "analysis_workflow", fields(jobs = jobs.len()))]
pub fn run<A: Analyzer>(
    orchestrator: &BatchOrchestrator<A>,
    jobs: Vec<StructureJob>,
    output_dir: &Path,
    placeholder_rows: bool,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<AnalysisSummary, EngineError> {
    std::fs::create_dir_all(output_dir).map_err(|e| EngineError::Io {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let outcome = orchestrator.run(jobs, reporter, cancel)?;
    let processed = outcome.outcomes.len();
    let table = MetricsTable::from_outcome(&outcome, placeholder_rows);
    let (rows, failures) = outcome.into_parts();
    let succeeded = rows.len();

    reporter.report(Progress::PhaseStart {
        name: "Writing Tables",
    });
    let outputs = AnalysisOutputs {
        contacts: output_dir.join(CONTACTS_FILE),
        failures: output_dir.join(FAILURES_FILE),
    };
    let table_rows: Vec<_> = table.rows().cloned().collect();
    write_contacts_path(&outputs.contacts, &table_rows)?;
    let failure_rows: Vec<(String, String)> = failures
        .iter()
        .map(|(id, reason)| (id.clone(), reason.to_string()))
        .collect();
    write_failures_path(&outputs.failures, &failure_rows)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        processed,
        succeeded,
        failed = failures.len(),
        contacts = %outputs.contacts.display(),
        "Analysis workflow complete."
    );

    Ok(AnalysisSummary {
        processed,
        succeeded,
        failed: failures.len(),
        table,
        failures,
        outputs,
    })
}
