use crate::cli::RankArgs;
use crate::config::{self, PartialRunConfig};
use crate::error::Result;
use pisabatch::core::ranking::RankedRow;
use pisabatch::workflows;
use tracing::info;

pub fn run(args: RankArgs) -> Result<()> {
    let partial = PartialRunConfig::load(args.config.as_deref(), &args.set_values)?;
    let ranking_config = config::resolve_ranking(&args, partial)?;
    info!(
        normalization = %ranking_config.normalization,
        overlap_penalty = ranking_config.overlap_penalty,
        "Resolved ranking configuration."
    );

    let (ranking, outputs) =
        workflows::rank::run(&args.input, &args.output_dir, &ranking_config)?;

    println!(
        "✓ Ranked {} structure(s) ({} without overlap)",
        ranking.all.len(),
        ranking.no_overlap.len()
    );
    println!("  {}", outputs.all.display());
    println!("  {}", outputs.no_overlap.display());

    let top = ranking.top_no_overlap(args.top_n);
    if !top.is_empty() {
        println!("\nTop {} without overlap:", top.len());
        println!("{:>5}  {:<32} {:>10} {:>10}", "rank", "binder", "score", "dG");
        for row in top {
            println!("{}", format_row(row));
        }
    }
    Ok(())
}

fn format_row(row: &RankedRow) -> String {
    let score = row
        .score
        .map(|s| format!("{:.4}", s))
        .unwrap_or_else(|| "-".to_string());
    let dg = row
        .metrics
        .dg_dissociation
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>5}  {:<32} {:>10} {:>10}",
        row.rank, row.metrics.identifier, score, dg
    )
}
