use super::analyzer::Analyzer;
use super::config::BatchConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::report::{ReportError, describe_chains, ensure_chain_present, read_report};
use crate::core::metrics::derive_metrics;
use crate::core::models::job::StructureJob;
use crate::core::models::metrics::StructureMetrics;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Shared flag that stops new jobs from starting. In-flight jobs run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a single structure produced no metrics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobFailure {
    #[error("{0}")]
    Analyzer(String),
    #[error("Unreadable report: {0}")]
    Report(String),
    #[error("Requested chain '{requested}' not found. Chains present: {}", describe_chains(.present))]
    MissingChain {
        requested: String,
        present: Vec<String>,
    },
    #[error("Cancelled before analysis started")]
    Cancelled,
}

impl From<ReportError> for JobFailure {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::MissingChain { requested, present } => {
                JobFailure::MissingChain { requested, present }
            }
            other => JobFailure::Report(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job: StructureJob,
    pub result: Result<StructureMetrics, JobFailure>,
}

/// One outcome per submitted job, in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&StructureJob, &JobFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|f| (&o.job, f)))
    }

    /// Splits into successful metric rows and `(identifier, failure)` pairs.
    pub fn into_parts(self) -> (Vec<StructureMetrics>, Vec<(String, JobFailure)>) {
        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(metrics) => rows.push(metrics),
                Err(failure) => failures.push((outcome.job.identifier, failure)),
            }
        }
        (rows, failures)
    }
}

pub struct BatchOrchestrator<A: Analyzer> {
    config: BatchConfig,
    analyzer: A,
}

struct RunState<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
    cancel: &'r CancellationToken,
    stop: AtomicBool,
    first_failure: OnceLock<(String, JobFailure)>,
    completed: AtomicUsize,
    total: usize,
}

impl<A: Analyzer> BatchOrchestrator<A> {
    pub fn new(config: BatchConfig, analyzer: A) -> Self {
        Self { config, analyzer }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Runs every job on a pool of `worker_count` threads.
    ///
    /// Per-job failures are recorded in the outcome and never abort the batch, unless
    /// `fail_fast` is set: then the first failure stops new jobs from starting and the run
    /// returns [`EngineError::FailFast`] once in-flight jobs finish.
    #[instrument(skip_all, name = "batch_run", fields(jobs = jobs.len(), workers = self.config.worker_count))]
    pub fn run(
        &self,
        jobs: Vec<StructureJob>,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, EngineError> {
        ensure_unique(&jobs)?;
        std::fs::create_dir_all(&self.config.report_dir).map_err(|e| EngineError::Io {
            path: self.config.report_dir.clone(),
            source: e,
        })?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count)
            .thread_name(|i| format!("pisa-worker-{}", i))
            .build()
            .map_err(|e| EngineError::Initialization(format!("worker pool: {}", e)))?;

        let total = jobs.len();
        let batch_size = self.config.batch_size.unwrap_or(total).max(1);
        info!(total, batch_size, "Starting interface analysis.");
        reporter.report(Progress::PhaseStart {
            name: "Interface Analysis",
        });
        reporter.report(Progress::TaskStart {
            total_steps: total as u64,
        });

        let state = RunState {
            reporter,
            cancel,
            stop: AtomicBool::new(false),
            first_failure: OnceLock::new(),
            completed: AtomicUsize::new(0),
            total,
        };

        let mut outcomes = Vec::with_capacity(total);
        for (index, batch) in jobs.chunks(batch_size).enumerate() {
            debug!(batch = index + 1, size = batch.len(), "Submitting batch.");
            let batch_outcomes: Vec<JobOutcome> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|job| self.process(job, &state))
                    .collect()
            });
            outcomes.extend(batch_outcomes);
        }

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        let outcome = BatchOutcome { outcomes };
        info!(
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "Interface analysis finished."
        );

        if let Some((identifier, reason)) = state.first_failure.into_inner() {
            return Err(EngineError::FailFast { identifier, reason });
        }
        Ok(outcome)
    }

    fn process(&self, job: &StructureJob, state: &RunState) -> JobOutcome {
        let result = if state.cancel.is_cancelled() || state.stop.load(Ordering::SeqCst) {
            Err(JobFailure::Cancelled)
        } else {
            self.analyze_job(job)
        };

        match &result {
            Ok(_) => debug!(identifier = %job.identifier, "Structure analysed."),
            Err(JobFailure::Cancelled) => {}
            Err(failure) => {
                warn!(identifier = %job.identifier, reason = %failure, "Structure analysis failed.");
                if self.config.fail_fast {
                    state.stop.store(true, Ordering::SeqCst);
                    let _ = state
                        .first_failure
                        .set((job.identifier.clone(), failure.clone()));
                }
            }
        }

        let done = state.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let step = (state.total / 10).max(1);
        if done % step == 0 || done == state.total {
            info!(completed = done, total = state.total, "Analysis progress.");
        }
        state.reporter.report(Progress::TaskIncrement);
        state.reporter.report(Progress::JobFinished {
            identifier: job.identifier.clone(),
            succeeded: result.is_ok(),
        });

        JobOutcome {
            job: job.clone(),
            result,
        }
    }

    /// analyse, emit report, parse and check chain, then always erase.
    fn analyze_job(&self, job: &StructureJob) -> Result<StructureMetrics, JobFailure> {
        let params = self.config.metric_params_for(job);
        let report_path = self.config.report_path_for(job);

        let parsed = self
            .analyzer
            .analyse(job)
            .and_then(|()| self.analyzer.emit_report(job, &report_path))
            .map_err(|e| JobFailure::Analyzer(e.to_string()))
            .and_then(|()| read_report(&report_path).map_err(JobFailure::from))
            .and_then(|report| {
                if self.config.check_chain {
                    ensure_chain_present(&report, &params.chain_id)?;
                }
                Ok(report)
            });

        let erased = self.analyzer.erase(job);
        if !self.config.keep_reports {
            remove_report(&report_path);
        }

        let report = match parsed {
            Ok(report) => report,
            Err(failure) => {
                if let Err(e) = erased {
                    warn!(identifier = %job.identifier, error = %e, "Erase failed after an earlier failure.");
                }
                return Err(failure);
            }
        };
        erased.map_err(|e| JobFailure::Analyzer(e.to_string()))?;
        Ok(derive_metrics(&job.identifier, &report, &params))
    }
}

fn ensure_unique(jobs: &[StructureJob]) -> Result<(), EngineError> {
    let mut seen = HashSet::with_capacity(jobs.len());
    for job in jobs {
        if !seen.insert(job.identifier.as_str()) {
            return Err(EngineError::DuplicateJob(job.identifier.clone()));
        }
    }
    Ok(())
}

fn remove_report(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove report file.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::analyzer::{AnalyzerError, AnalyzerStage};
    use crate::engine::config::BatchConfigBuilder;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Ok,
        FailAnalyse,
        FailEmit,
        FailErase,
        Garbage,
        OtherChain,
    }

    fn report_xml(chain: &str) -> String {
        format!(
            "<pisa_interfaces><interface><stab_en>-4.2</stab_en><int_area>420.0</int_area>\
             <molecule><chain_id>{chain}</chain_id><residues>\
             <residue><name>LEU</name><seq_num>50</seq_num><asa>100</asa><bsa>64</bsa></residue>\
             </residues></molecule>\
             <molecule><chain_id>Z</chain_id></molecule></interface></pisa_interfaces>"
        )
    }

    fn exit_error(stage: AnalyzerStage) -> AnalyzerError {
        AnalyzerError::Spawn {
            stage,
            source: io::Error::other(format!("{} refused", stage)),
        }
    }

    #[derive(Default)]
    struct ScriptedAnalyzer {
        behaviors: HashMap<String, Behavior>,
        analysed: Mutex<Vec<String>>,
        erased: Mutex<Vec<String>>,
    }

    impl ScriptedAnalyzer {
        fn with(mut self, id: &str, behavior: Behavior) -> Self {
            self.behaviors.insert(id.to_string(), behavior);
            self
        }

        fn behavior(&self, job: &StructureJob) -> Behavior {
            self.behaviors
                .get(&job.identifier)
                .copied()
                .unwrap_or(Behavior::Ok)
        }
    }

    impl Analyzer for ScriptedAnalyzer {
        fn analyse(&self, job: &StructureJob) -> Result<(), AnalyzerError> {
            self.analysed.lock().unwrap().push(job.identifier.clone());
            match self.behavior(job) {
                Behavior::FailAnalyse => Err(exit_error(AnalyzerStage::Analyse)),
                _ => Ok(()),
            }
        }

        fn emit_report(&self, job: &StructureJob, path: &Path) -> Result<(), AnalyzerError> {
            let body = match self.behavior(job) {
                Behavior::FailEmit => return Err(exit_error(AnalyzerStage::EmitReport)),
                Behavior::Garbage => "<pisa_interfaces><interface>".to_string(),
                Behavior::OtherChain => report_xml("B"),
                _ => report_xml("A"),
            };
            std::fs::write(path, body).unwrap();
            Ok(())
        }

        fn erase(&self, job: &StructureJob) -> Result<(), AnalyzerError> {
            self.erased.lock().unwrap().push(job.identifier.clone());
            match self.behavior(job) {
                Behavior::FailErase | Behavior::FailEmit => Err(exit_error(AnalyzerStage::Erase)),
                _ => Ok(()),
            }
        }
    }

    fn jobs(ids: &[&str]) -> Vec<StructureJob> {
        ids.iter()
            .map(|id| StructureJob::new(*id, PathBuf::from(format!("{id}.pdb"))))
            .collect()
    }

    fn config(dir: &TempDir) -> BatchConfigBuilder {
        BatchConfigBuilder::new()
            .worker_count(3)
            .report_dir(dir.path().join("reports"))
    }

    fn run(
        builder: BatchConfigBuilder,
        analyzer: ScriptedAnalyzer,
        ids: &[&str],
    ) -> (Result<BatchOutcome, EngineError>, ScriptedAnalyzer) {
        let orchestrator = BatchOrchestrator::new(builder.build().unwrap(), analyzer);
        let result = orchestrator.run(jobs(ids), &ProgressReporter::new(), &CancellationToken::new());
        (result, orchestrator.analyzer)
    }

    #[test]
    fn successful_jobs_yield_metrics_in_submission_order() {
        let dir = tempdir().unwrap();
        let (result, analyzer) = run(config(&dir), ScriptedAnalyzer::default(), &["c", "a", "b"]);
        let outcome = result.unwrap();
        let ids: Vec<&str> = outcome
            .outcomes
            .iter()
            .map(|o| o.job.identifier.as_str())
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(outcome.succeeded(), 3);

        let metrics = outcome.outcomes[0].result.as_ref().unwrap();
        assert_eq!(metrics.identifier, "c");
        assert_eq!(metrics.bsa_score, 6);
        assert_eq!(metrics.dg_dissociation, Some(-4.2));
        assert_eq!(analyzer.erased.lock().unwrap().len(), 3);
        assert!(dir.path().join("reports").join("a.xml").exists());
    }

    #[test]
    fn failures_are_isolated_and_always_erased() {
        let dir = tempdir().unwrap();
        let analyzer = ScriptedAnalyzer::default()
            .with("bad_analyse", Behavior::FailAnalyse)
            .with("bad_xml", Behavior::Garbage);
        let (result, analyzer) = run(config(&dir), analyzer, &["ok", "bad_analyse", "bad_xml"]);
        let outcome = result.unwrap();
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed(), 2);

        let failures: HashMap<&str, &JobFailure> = outcome
            .failures()
            .map(|(job, f)| (job.identifier.as_str(), f))
            .collect();
        assert!(matches!(failures["bad_analyse"], JobFailure::Analyzer(_)));
        assert!(matches!(failures["bad_xml"], JobFailure::Report(_)));

        let mut erased = analyzer.erased.lock().unwrap().clone();
        erased.sort();
        assert_eq!(erased, ["bad_analyse", "bad_xml", "ok"]);
    }

    #[test]
    fn erase_failure_does_not_mask_earlier_failure() {
        let dir = tempdir().unwrap();
        let analyzer = ScriptedAnalyzer::default().with("x", Behavior::FailEmit);
        let (result, _) = run(config(&dir), analyzer, &["x"]);
        let outcome = result.unwrap();
        let failure = outcome.outcomes[0].result.as_ref().unwrap_err();
        assert!(failure.to_string().contains("xml report"), "{failure}");
    }

    #[test]
    fn erase_failure_alone_fails_the_job() {
        let dir = tempdir().unwrap();
        let analyzer = ScriptedAnalyzer::default().with("x", Behavior::FailErase);
        let (result, _) = run(config(&dir), analyzer, &["x"]);
        let failure = result.unwrap().outcomes[0].result.clone().unwrap_err();
        assert!(failure.to_string().contains("erase"));
    }

    #[test]
    fn missing_chain_lists_chains_present() {
        let dir = tempdir().unwrap();
        let analyzer = ScriptedAnalyzer::default().with("x", Behavior::OtherChain);
        let (result, _) = run(config(&dir), analyzer, &["x"]);
        let failure = result.unwrap().outcomes[0].result.clone().unwrap_err();
        assert_eq!(
            failure,
            JobFailure::MissingChain {
                requested: "A".into(),
                present: vec!["B".into(), "Z".into()],
            }
        );
        assert!(failure.to_string().ends_with("Chains present: B, Z"));
    }

    #[test]
    fn chain_check_can_be_disabled() {
        let dir = tempdir().unwrap();
        let analyzer = ScriptedAnalyzer::default().with("x", Behavior::OtherChain);
        let (result, _) = run(config(&dir).check_chain(false), analyzer, &["x"]);
        let metrics = result.unwrap().outcomes[0].result.clone().unwrap();
        assert_eq!(metrics.interface_count, 0);
        assert_eq!(metrics.bsa_score, 0);
    }

    #[test]
    fn duplicate_identifiers_fail_before_any_job_runs() {
        let dir = tempdir().unwrap();
        let (result, analyzer) = run(config(&dir), ScriptedAnalyzer::default(), &["a", "b", "a"]);
        assert!(matches!(result, Err(EngineError::DuplicateJob(id)) if id == "a"));
        assert!(analyzer.analysed.lock().unwrap().is_empty());
    }

    #[test]
    fn cancelled_token_leaves_jobs_unstarted() {
        let dir = tempdir().unwrap();
        let orchestrator =
            BatchOrchestrator::new(config(&dir).build().unwrap(), ScriptedAnalyzer::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = orchestrator
            .run(jobs(&["a", "b"]), &ProgressReporter::new(), &cancel)
            .unwrap();
        assert!(
            outcome
                .outcomes
                .iter()
                .all(|o| o.result == Err(JobFailure::Cancelled))
        );
        assert!(orchestrator.analyzer().analysed.lock().unwrap().is_empty());
    }

    #[test]
    fn fail_fast_stops_submission_and_returns_error() {
        let dir = tempdir().unwrap();
        let analyzer = ScriptedAnalyzer::default().with("first", Behavior::FailAnalyse);
        let builder = config(&dir).worker_count(1).batch_size(Some(1)).fail_fast(true);
        let (result, analyzer) = run(builder, analyzer, &["first", "second", "third"]);
        match result {
            Err(EngineError::FailFast { identifier, reason }) => {
                assert_eq!(identifier, "first");
                assert!(matches!(reason, JobFailure::Analyzer(_)));
            }
            other => panic!("expected fail-fast error, got {other:?}"),
        }
        assert_eq!(*analyzer.analysed.lock().unwrap(), ["first"]);
    }

    #[test]
    fn batching_does_not_change_results() {
        let ids = ["a", "b", "c", "d", "e"];
        let dir = tempdir().unwrap();
        let (whole, _) = run(config(&dir), ScriptedAnalyzer::default(), &ids);
        let dir = tempdir().unwrap();
        let (batched, _) = run(
            config(&dir).batch_size(Some(2)),
            ScriptedAnalyzer::default(),
            &ids,
        );
        let strip = |o: BatchOutcome| o.into_parts().0;
        assert_eq!(strip(whole.unwrap()), strip(batched.unwrap()));
    }

    #[test]
    fn reports_are_removed_when_not_kept() {
        let dir = tempdir().unwrap();
        let (result, _) = run(
            config(&dir).keep_reports(false),
            ScriptedAnalyzer::default(),
            &["a"],
        );
        assert_eq!(result.unwrap().succeeded(), 1);
        assert!(!dir.path().join("reports").join("a.xml").exists());
    }

    #[test]
    fn progress_reports_every_job() {
        let dir = tempdir().unwrap();
        let finished = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::JobFinished { identifier, succeeded } = event {
                finished.lock().unwrap().push((identifier, succeeded));
            }
        }));
        let orchestrator = BatchOrchestrator::new(
            config(&dir).build().unwrap(),
            ScriptedAnalyzer::default().with("b", Behavior::FailAnalyse),
        );
        orchestrator
            .run(jobs(&["a", "b"]), &reporter, &CancellationToken::new())
            .unwrap();
        drop(reporter);
        let mut finished = finished.into_inner().unwrap();
        finished.sort();
        assert_eq!(
            finished,
            [("a".to_string(), true), ("b".to_string(), false)]
        );
    }
}
