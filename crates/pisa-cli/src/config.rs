use crate::cli::{AnalyzeArgs, RankArgs};
use crate::error::{CliError, Result};
use pisabatch::core::io::settings::ResourceSettings;
use pisabatch::core::metrics::BondCounting;
use pisabatch::core::ranking::normalize::NormalizationMode;
use pisabatch::core::ranking::{RankingConfig, RankingWeights};
use pisabatch::engine::config::{BatchConfig, BatchConfigBuilder};
use pisabatch::engine::resources::ResourceEstimate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_EXTENSION: &str = "pdb";
pub const DEFAULT_REPORT_SUBDIR: &str = "pisa_xml";

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialAnalysisConfig {
    pub analyzer: Option<PathBuf>,
    pub chain: Option<String>,
    #[serde(rename = "residue-floor")]
    pub residue_floor: Option<i64>,
    #[serde(rename = "report-dir")]
    pub report_dir: Option<PathBuf>,
    #[serde(rename = "check-chain")]
    pub check_chain: Option<bool>,
    #[serde(rename = "keep-reports")]
    pub keep_reports: Option<bool>,
    #[serde(rename = "fail-fast")]
    pub fail_fast: Option<bool>,
    #[serde(rename = "bond-counting")]
    pub bond_counting: Option<String>,
    #[serde(rename = "placeholder-rows")]
    pub placeholder_rows: Option<bool>,
    pub workers: Option<usize>,
    #[serde(rename = "batch-size")]
    pub batch_size: Option<usize>,
    pub extension: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialWeights {
    #[serde(rename = "size-avg")]
    pub size_avg: Option<f64>,
    pub interactions: Option<f64>,
    #[serde(rename = "good-dg")]
    pub good_dg: Option<f64>,
    #[serde(rename = "good-solv")]
    pub good_solv: Option<f64>,
    pub specificity: Option<f64>,
    #[serde(rename = "dg-per-100a2")]
    pub dg_per_100a2: Option<f64>,
}

impl PartialWeights {
    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "size-avg" => Some(&mut self.size_avg),
            "interactions" => Some(&mut self.interactions),
            "good-dg" => Some(&mut self.good_dg),
            "good-solv" => Some(&mut self.good_solv),
            "specificity" => Some(&mut self.specificity),
            "dg-per-100a2" => Some(&mut self.dg_per_100a2),
            _ => None,
        }
    }

    fn merge_into(self, defaults: RankingWeights) -> RankingWeights {
        RankingWeights {
            size_avg: self.size_avg.unwrap_or(defaults.size_avg),
            interactions: self.interactions.unwrap_or(defaults.interactions),
            good_dg: self.good_dg.unwrap_or(defaults.good_dg),
            good_solv: self.good_solv.unwrap_or(defaults.good_solv),
            specificity: self.specificity.unwrap_or(defaults.specificity),
            dg_per_100a2: self.dg_per_100a2.unwrap_or(defaults.dg_per_100a2),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialRankingConfig {
    pub normalization: Option<String>,
    #[serde(rename = "overlap-penalty")]
    pub overlap_penalty: Option<f64>,
    pub weights: Option<PartialWeights>,
}

/// Contents of the optional TOML configuration file, every key optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    pub analysis: Option<PartialAnalysisConfig>,
    pub ranking: Option<PartialRankingConfig>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Reading configuration file.");
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the file when given, then layers the `-S` overrides on top.
    pub fn load(path: Option<&Path>, set_values: &[String]) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_set_values(set_values)?;
        Ok(config)
    }

    pub fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
            if parts.len() != 2 {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            }
            let key = parts[0].trim();
            let value_str = parts[1].trim();

            if let Some(name) = key.strip_prefix("ranking.weights.") {
                let weights = self
                    .ranking
                    .get_or_insert_with(Default::default)
                    .weights
                    .get_or_insert_with(Default::default);
                let slot = weights.slot(name).ok_or_else(|| unsupported(key))?;
                *slot = Some(parse_value(key, value_str, "float")?);
                continue;
            }

            if let Some(name) = key.strip_prefix("ranking.") {
                let ranking = self.ranking.get_or_insert_with(Default::default);
                match name {
                    "normalization" => ranking.normalization = Some(value_str.to_string()),
                    "overlap-penalty" => {
                        ranking.overlap_penalty = Some(parse_value(key, value_str, "float")?)
                    }
                    _ => return Err(unsupported(key)),
                }
                continue;
            }

            let Some(name) = key.strip_prefix("analysis.") else {
                return Err(unsupported(key));
            };
            let analysis = self.analysis.get_or_insert_with(Default::default);
            match name {
                "analyzer" => analysis.analyzer = Some(PathBuf::from(value_str)),
                "chain" => analysis.chain = Some(value_str.to_string()),
                "residue-floor" => {
                    analysis.residue_floor = Some(parse_value(key, value_str, "integer")?)
                }
                "report-dir" => analysis.report_dir = Some(PathBuf::from(value_str)),
                "check-chain" => {
                    analysis.check_chain = Some(parse_value(key, value_str, "boolean")?)
                }
                "keep-reports" => {
                    analysis.keep_reports = Some(parse_value(key, value_str, "boolean")?)
                }
                "fail-fast" => analysis.fail_fast = Some(parse_value(key, value_str, "boolean")?),
                "placeholder-rows" => {
                    analysis.placeholder_rows = Some(parse_value(key, value_str, "boolean")?)
                }
                "bond-counting" => analysis.bond_counting = Some(value_str.to_string()),
                "workers" => analysis.workers = Some(parse_value(key, value_str, "integer")?),
                "batch-size" => analysis.batch_size = Some(parse_value(key, value_str, "integer")?),
                "extension" => analysis.extension = Some(value_str.to_string()),
                _ => return Err(unsupported(key)),
            }
        }
        Ok(())
    }
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!("Unsupported key for --set: {}", key))
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

pub fn parse_bond_counting(value: &str) -> Result<BondCounting> {
    match value.trim().to_ascii_lowercase().as_str() {
        "per-endpoint" | "endpoint" => Ok(BondCounting::PerEndpoint),
        "per-bond" | "bond" => Ok(BondCounting::PerBond),
        other => Err(CliError::Config(format!(
            "Unknown bond counting '{}'. Expected 'per-endpoint' or 'per-bond'.",
            other
        ))),
    }
}

/// Everything the `analyze` command needs once all configuration layers are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPlan {
    pub batch: BatchConfig,
    pub analyzer: Option<PathBuf>,
    pub extension: String,
    pub placeholder_rows: bool,
}

/// Merges CLI flags, `-S` overrides (already applied to `file`), the config file, the
/// settings file and the estimator, in that order of precedence.
///
/// The estimator only runs when no other layer supplies a worker count.
pub fn resolve_analysis(
    args: &AnalyzeArgs,
    file: PartialRunConfig,
    settings: Option<&ResourceSettings>,
    estimate: impl FnOnce() -> ResourceEstimate,
) -> Result<AnalysisPlan> {
    let file = file.analysis.unwrap_or_default();

    let (worker_count, source) = if let Some(n) = args.workers {
        (n, "command line")
    } else if let Some(n) = file.workers {
        (n, "config file")
    } else if let Some(s) = settings {
        (s.max_workers, "settings file")
    } else {
        (estimate().worker_count, "estimator")
    };
    info!(workers = worker_count, source, "Resolved worker count.");

    let batch_size = args
        .batch_size
        .or(file.batch_size)
        .or(settings.and_then(|s| s.batch_size));

    let bond_counting = if args.per_bond {
        BondCounting::PerBond
    } else {
        file.bond_counting
            .as_deref()
            .map(parse_bond_counting)
            .transpose()?
            .unwrap_or_default()
    };

    let report_dir = args
        .report_dir
        .clone()
        .or(file.report_dir)
        .unwrap_or_else(|| args.output_dir.join(DEFAULT_REPORT_SUBDIR));

    let mut builder = BatchConfigBuilder::new()
        .worker_count(worker_count)
        .batch_size(batch_size)
        .report_dir(report_dir)
        .check_chain(!args.no_chain_check && file.check_chain.unwrap_or(true))
        .keep_reports(!args.discard_reports && file.keep_reports.unwrap_or(true))
        .fail_fast(args.fail_fast || file.fail_fast.unwrap_or(false))
        .bond_counting(bond_counting);
    if let Some(chain) = args.chain.clone().or(file.chain) {
        builder = builder.chain_id(chain);
    }
    if let Some(floor) = args.residue_floor.or(file.residue_floor) {
        builder = builder.residue_floor(floor);
    }
    let batch = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AnalysisPlan {
        batch,
        analyzer: args.analyzer.clone().or(file.analyzer),
        extension: args
            .extension
            .clone()
            .or(file.extension)
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        placeholder_rows: args.placeholder_rows || file.placeholder_rows.unwrap_or(false),
    })
}

pub fn resolve_ranking(args: &RankArgs, file: PartialRunConfig) -> Result<RankingConfig> {
    let file = file.ranking.unwrap_or_default();
    let defaults = RankingConfig::default();

    let normalization = match (args.normalization, file.normalization.as_deref()) {
        (Some(mode), _) => mode,
        (None, Some(text)) => NormalizationMode::from_str(text).map_err(CliError::Config)?,
        (None, None) => defaults.normalization,
    };

    let config = RankingConfig {
        weights: file
            .weights
            .unwrap_or_default()
            .merge_into(defaults.weights),
        overlap_penalty: args
            .overlap_penalty
            .or(file.overlap_penalty)
            .unwrap_or(defaults.overlap_penalty),
        normalization,
    };
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}
