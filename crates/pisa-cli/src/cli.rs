use clap::{Args, Parser, Subcommand, ValueEnum};
use pisabatch::core::ranking::normalize::NormalizationMode;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "pisabatch - Batch protein-interface analysis with PISA: run the analyzer over a directory of structures, tabulate interface metrics and rank binders.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the analyzer on every structure in a directory and write the contacts table.
    Analyze(AnalyzeArgs),
    /// Score and rank the binders of a contacts table.
    Rank(RankArgs),
    /// Join a contacts table with per-sequence metadata.
    Merge(MergeArgs),
    /// Measure this host and write a resource settings file.
    Estimate(EstimateArgs),
    /// Check that the analyzer executable can be found.
    Preflight(PreflightArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    // --- Core Arguments ---
    /// Directory containing the structure files to analyse.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving contacts.csv and failures.csv.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Resource settings file written by `estimate` (max_workers, batch_size).
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Path to the analyzer executable. Falls back to PISA_EXE, then `pisa` on PATH.
    #[arg(long, value_name = "PATH")]
    pub analyzer: Option<PathBuf>,

    /// File extension of the structure files.
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    // --- Metric Overrides ---
    /// Chain whose interface residues are scored.
    #[arg(long, value_name = "ID")]
    pub chain: Option<String>,

    /// Residues numbered below this value are ignored.
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    pub residue_floor: Option<i64>,

    /// Count each bond once instead of once per matching endpoint.
    #[arg(long)]
    pub per_bond: bool,

    // --- Execution Overrides ---
    /// Number of analyzer processes run concurrently.
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Number of structures dispatched per batch.
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Directory for the per-structure XML reports. Defaults to <output-dir>/pisa_xml.
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Stop dispatching new structures after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Skip the check that the scored chain is present in each report.
    #[arg(long)]
    pub no_chain_check: bool,

    /// Delete each XML report once its metrics are extracted.
    #[arg(long)]
    pub discard_reports: bool,

    /// Add an all-empty contacts row for every failed structure.
    #[arg(long)]
    pub placeholder_rows: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S analysis.chain=B
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `rank` subcommand.
#[derive(Args, Debug)]
pub struct RankArgs {
    /// Contacts table produced by `analyze`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory receiving ranked_all.csv and ranked_no_overlap.csv.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Column normalization: z-score or min-max.
    #[arg(long, value_name = "MODE")]
    pub normalization: Option<NormalizationMode>,

    /// Amount subtracted from the score of overlapping interfaces.
    #[arg(long, value_name = "FLOAT")]
    pub overlap_penalty: Option<f64>,

    /// Number of non-overlapping binders printed after ranking.
    #[arg(short = 'n', long, default_value_t = 10, value_name = "NUM")]
    pub top_n: usize,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S ranking.weights.good-dg=0.3
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    /// Keep only structures with metadata.
    #[default]
    Inner,
    /// Keep every structure; missing metadata is left blank.
    Left,
}

/// Arguments for the `merge` subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Contacts table produced by `analyze`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub contacts: PathBuf,

    /// Per-sequence metadata table.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub metadata: PathBuf,

    /// Path of the merged CSV.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Metadata column matched against the binder identifier.
    #[arg(short, long, default_value = pisabatch::workflows::merge::DEFAULT_KEY_COLUMN, value_name = "COLUMN")]
    pub key: String,

    /// Join semantics for structures without metadata.
    #[arg(long, value_enum, default_value_t = JoinKind::Inner)]
    pub join: JoinKind,

    /// Metadata field delimiter. Inferred from the file extension when omitted.
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,
}

/// Arguments for the `estimate` subcommand.
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Directory used for the disk throughput probe.
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub scratch_dir: PathBuf,

    /// Settings file to write.
    #[arg(short, long, default_value = "compute_settings.txt", value_name = "PATH")]
    pub output: PathBuf,

    /// Skip the disk throughput probe and size from cores and memory only.
    #[arg(long)]
    pub no_probe: bool,

    /// Size of the probe file in MiB.
    #[arg(long, default_value_t = 64, value_name = "MIB")]
    pub probe_mib: u64,

    /// Memory budget per analyzer process in GiB.
    #[arg(long, value_name = "GIB")]
    pub per_worker_gib: Option<f64>,
}

/// Arguments for the `preflight` subcommand.
#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// Path to the analyzer executable. Falls back to PISA_EXE, then `pisa` on PATH.
    #[arg(long, value_name = "PATH")]
    pub analyzer: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_accepts_overrides_and_set_values() {
        let cli = Cli::parse_from([
            "pisabatch",
            "-vv",
            "analyze",
            "-i",
            "structures",
            "-o",
            "out",
            "--chain",
            "B",
            "--residue-floor",
            "-5",
            "-w",
            "4",
            "--per-bond",
            "-S",
            "analysis.fail-fast=true",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.chain.as_deref(), Some("B"));
        assert_eq!(args.residue_floor, Some(-5));
        assert_eq!(args.workers, Some(4));
        assert!(args.per_bond);
        assert_eq!(args.set_values, ["analysis.fail-fast=true"]);
    }

    #[test]
    fn rank_parses_normalization_mode() {
        let cli = Cli::parse_from([
            "pisabatch",
            "rank",
            "-i",
            "contacts.csv",
            "-o",
            "ranked",
            "--normalization",
            "min-max",
        ]);
        let Commands::Rank(args) = cli.command else {
            panic!("expected rank");
        };
        assert_eq!(args.normalization, Some(NormalizationMode::MinMax));
        assert_eq!(args.top_n, 10);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["pisabatch", "-q", "-v", "preflight"]);
        assert!(result.is_err());
    }
}
