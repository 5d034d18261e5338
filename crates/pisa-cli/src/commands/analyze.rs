use crate::cli::AnalyzeArgs;
use crate::config::{self, PartialRunConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use pisabatch::core::io::settings::ResourceSettings;
use pisabatch::engine::analyzer::PisaAnalyzer;
use pisabatch::engine::error::EngineError;
use pisabatch::engine::orchestrator::{BatchOrchestrator, CancellationToken};
use pisabatch::engine::progress::ProgressReporter;
use pisabatch::engine::resources::{self, EstimatorConfig};
use pisabatch::workflows;
use tracing::{info, warn};

const LISTED_FAILURES: usize = 10;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let partial = PartialRunConfig::load(args.config.as_deref(), &args.set_values)?;

    let settings = match &args.settings {
        Some(path) => {
            info!(path = %path.display(), "Loading resource settings.");
            Some(
                ResourceSettings::from_path(path).map_err(|e| CliError::FileParsing {
                    path: path.clone(),
                    source: e.into(),
                })?,
            )
        }
        None => None,
    };

    let plan = config::resolve_analysis(&args, partial, settings.as_ref(), || {
        let mut estimator = EstimatorConfig::new(args.output_dir.clone());
        estimator.run_probe = false;
        resources::estimate(&estimator)
    })?;

    let analyzer = PisaAnalyzer::resolve(plan.analyzer.as_deref()).map_err(EngineError::from)?;
    info!(executable = %analyzer.executable().display(), "Using analyzer.");

    let jobs = workflows::analyze::discover_structures(&args.input_dir, &plan.extension)?;
    if jobs.is_empty() {
        return Err(CliError::Argument(format!(
            "No '.{}' files found in {}",
            plan.extension.trim_start_matches('.'),
            args.input_dir.display()
        )));
    }

    println!(
        "Analysing {} structure(s) with {} worker(s), chain {}...",
        jobs.len(),
        plan.batch.worker_count,
        plan.batch.chain_id
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let orchestrator = BatchOrchestrator::new(plan.batch, analyzer);
    let summary = workflows::analyze::run(
        &orchestrator,
        jobs,
        &args.output_dir,
        plan.placeholder_rows,
        &reporter,
        &CancellationToken::new(),
    )?;

    println!(
        "✓ {} of {} structure(s) analysed; contacts written to {}",
        summary.succeeded,
        summary.processed,
        summary.outputs.contacts.display()
    );
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some structures failed.");
        println!(
            "  {} failure(s) recorded in {}",
            summary.failed,
            summary.outputs.failures.display()
        );
        for (identifier, reason) in summary.failures.iter().take(LISTED_FAILURES) {
            println!("    {}: {}", identifier, reason);
        }
        if summary.failed > LISTED_FAILURES {
            println!("    ... and {} more", summary.failed - LISTED_FAILURES);
        }
    }

    if !summary.is_success() {
        return Err(CliError::NothingSucceeded {
            processed: summary.processed,
            failed: summary.failed,
        });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_analyzer(dir: &Path, body: &str) -> String {
        let script = dir.join("pisa");
        std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    fn analyze_args(input: &Path, output: &Path, analyzer: &str) -> AnalyzeArgs {
        let argv = [
            "pisabatch",
            "analyze",
            "-i",
            &input.display().to_string(),
            "-o",
            &output.display().to_string(),
            "--analyzer",
            analyzer,
            "-w",
            "1",
            "--no-chain-check",
        ]
        .map(String::from);
        match Cli::parse_from(argv).command {
            Commands::Analyze(args) => args,
            _ => unreachable!(),
        }
    }

    fn structures(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(format!("{name}.pdb")), "ATOM\n").unwrap();
        }
    }

    #[test]
    #[serial]
    fn run_where_every_structure_fails_reports_nothing_succeeded() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("designs");
        std::fs::create_dir(&input).unwrap();
        structures(&input, &["design_01", "design_02"]);
        let analyzer = write_analyzer(dir.path(), "echo 'session locked' >&2\nexit 1\n");
        let output = dir.path().join("out");

        let err = run(analyze_args(&input, &output, &analyzer)).unwrap_err();
        assert!(matches!(
            err,
            CliError::NothingSucceeded {
                processed: 2,
                failed: 2
            }
        ));
        assert_eq!(err.exit_code(), 1);

        let failures = std::fs::read_to_string(output.join("failures.csv")).unwrap();
        assert!(failures.contains("design_01"));
        assert!(failures.contains("design_02"));
    }

    #[test]
    #[serial]
    fn partial_success_still_exits_cleanly() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("designs");
        std::fs::create_dir(&input).unwrap();
        structures(&input, &["design_01", "design_broken"]);
        let analyzer = write_analyzer(
            dir.path(),
            "case \"$1\" in *broken*) exit 1 ;; esac\n\
             if [ \"$2\" = \"-xml\" ]; then echo '<pisa_interfaces></pisa_interfaces>'; fi\n\
             exit 0\n",
        );
        let output = dir.path().join("out");

        run(analyze_args(&input, &output, &analyzer)).unwrap();

        let contacts = std::fs::read_to_string(output.join("contacts.csv")).unwrap();
        assert!(contacts.contains("design_01"));
        assert!(!contacts.contains("design_broken"));
        let failures = std::fs::read_to_string(output.join("failures.csv")).unwrap();
        assert!(failures.contains("design_broken"));
    }

    #[test]
    #[serial]
    fn empty_input_directory_is_an_argument_error() {
        let dir = tempdir().unwrap();
        let analyzer = write_analyzer(dir.path(), "exit 0\n");
        let output = dir.path().join("out");

        let err = run(analyze_args(dir.path(), &output, &analyzer)).unwrap_err();
        assert!(matches!(err, CliError::Argument(ref msg) if msg.contains("'.pdb'")));
        assert_eq!(err.exit_code(), 2);
    }
}
