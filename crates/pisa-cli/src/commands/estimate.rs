use crate::cli::EstimateArgs;
use crate::error::{CliError, Result};
use pisabatch::engine::error::EngineError;
use pisabatch::engine::resources::{self, EstimatorConfig};
use tracing::info;

const MIB: u64 = 1024 * 1024;

pub fn run(args: EstimateArgs) -> Result<()> {
    if args.probe_mib == 0 {
        return Err(CliError::Argument("--probe-mib must be at least 1".to_string()));
    }

    let mut estimator = EstimatorConfig::new(args.scratch_dir.clone());
    estimator.run_probe = !args.no_probe;
    estimator.probe_bytes = args.probe_mib * MIB;
    if let Some(gib) = args.per_worker_gib {
        if !(gib > 0.0) || !gib.is_finite() {
            return Err(CliError::Argument(format!(
                "--per-worker-gib must be a positive number, got {}",
                gib
            )));
        }
        estimator.per_worker_gib = gib;
    }

    if estimator.run_probe {
        println!(
            "Probing disk throughput in {} ({} MiB)...",
            estimator.scratch_dir.display(),
            args.probe_mib
        );
    }
    let estimate = resources::estimate(&estimator);
    for note in estimate.notes() {
        println!("  {}", note);
    }

    estimate
        .write_report(&args.output)
        .map_err(EngineError::from)?;
    info!(path = %args.output.display(), "Resource settings written.");
    println!(
        "✓ max_workers: {}, batch_size: {} written to {}",
        estimate.worker_count,
        estimate.batch_size,
        args.output.display()
    );
    Ok(())
}
