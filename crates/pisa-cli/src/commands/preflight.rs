use crate::cli::PreflightArgs;
use crate::error::Result;
use pisabatch::engine::analyzer::PisaAnalyzer;
use pisabatch::engine::error::EngineError;
use tracing::info;

pub fn run(args: PreflightArgs) -> Result<()> {
    let analyzer = PisaAnalyzer::resolve(args.analyzer.as_deref()).map_err(EngineError::from)?;
    info!(executable = %analyzer.executable().display(), "Analyzer located.");
    println!("✓ Analyzer found: {}", analyzer.executable().display());
    Ok(())
}
