use crate::core::metrics::{BondCounting, MetricParams};
use crate::core::models::job::StructureJob;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

pub const DEFAULT_CHAIN_ID: &str = "A";

/// Parameters of one batch run. Built once, shared read-only by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub chain_id: String,
    pub residue_floor: i64,
    pub worker_count: usize,
    pub batch_size: Option<usize>,
    pub report_dir: PathBuf,
    pub check_chain: bool,
    pub keep_reports: bool,
    pub fail_fast: bool,
    pub bond_counting: BondCounting,
}

impl BatchConfig {
    /// Metric parameters for `job`, honoring its per-job chain and floor overrides.
    pub fn metric_params_for(&self, job: &StructureJob) -> MetricParams {
        MetricParams {
            chain_id: job.chain_id.clone().unwrap_or_else(|| self.chain_id.clone()),
            residue_floor: job.residue_floor.unwrap_or(self.residue_floor),
            bond_counting: self.bond_counting,
        }
    }

    pub fn report_path_for(&self, job: &StructureJob) -> PathBuf {
        self.report_dir.join(job.report_file_name())
    }
}

#[derive(Default)]
pub struct BatchConfigBuilder {
    chain_id: Option<String>,
    residue_floor: Option<i64>,
    worker_count: Option<usize>,
    batch_size: Option<usize>,
    report_dir: Option<PathBuf>,
    check_chain: Option<bool>,
    keep_reports: Option<bool>,
    fail_fast: Option<bool>,
    bond_counting: Option<BondCounting>,
}

impl BatchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }
    pub fn residue_floor(mut self, floor: i64) -> Self {
        self.residue_floor = Some(floor);
        self
    }
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }
    pub fn batch_size(mut self, size: Option<usize>) -> Self {
        self.batch_size = size;
        self
    }
    pub fn report_dir(mut self, dir: PathBuf) -> Self {
        self.report_dir = Some(dir);
        self
    }
    pub fn check_chain(mut self, check: bool) -> Self {
        self.check_chain = Some(check);
        self
    }
    pub fn keep_reports(mut self, keep: bool) -> Self {
        self.keep_reports = Some(keep);
        self
    }
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = Some(fail_fast);
        self
    }
    pub fn bond_counting(mut self, counting: BondCounting) -> Self {
        self.bond_counting = Some(counting);
        self
    }

    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        let worker_count = self
            .worker_count
            .ok_or(ConfigError::MissingParameter("worker_count"))?;
        if worker_count == 0 {
            return Err(ConfigError::Invalid {
                parameter: "worker_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.batch_size == Some(0) {
            return Err(ConfigError::Invalid {
                parameter: "batch_size",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        let chain_id = self
            .chain_id
            .unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string());
        if chain_id.trim().is_empty() || chain_id.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                parameter: "chain_id",
                reason: format!("'{}' is not a chain identifier", chain_id),
            });
        }

        Ok(BatchConfig {
            chain_id,
            residue_floor: self.residue_floor.unwrap_or(0),
            worker_count,
            batch_size: self.batch_size,
            report_dir: self
                .report_dir
                .ok_or(ConfigError::MissingParameter("report_dir"))?,
            check_chain: self.check_chain.unwrap_or(true),
            keep_reports: self.keep_reports.unwrap_or(true),
            fail_fast: self.fail_fast.unwrap_or(false),
            bond_counting: self.bond_counting.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> BatchConfigBuilder {
        BatchConfigBuilder::new()
            .worker_count(4)
            .report_dir(PathBuf::from("reports"))
    }

    #[test]
    fn build_applies_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.chain_id, "A");
        assert_eq!(config.residue_floor, 0);
        assert_eq!(config.batch_size, None);
        assert!(config.check_chain);
        assert!(config.keep_reports);
        assert!(!config.fail_fast);
        assert_eq!(config.bond_counting, BondCounting::PerEndpoint);
    }

    #[test]
    fn build_fails_without_required_parameters() {
        let err = BatchConfigBuilder::new()
            .report_dir(PathBuf::from("r"))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("worker_count"));

        let err = BatchConfigBuilder::new().worker_count(1).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("report_dir"));
    }

    #[test]
    fn build_rejects_zero_workers_batches_and_blank_chain() {
        assert!(matches!(
            minimal().worker_count(0).build(),
            Err(ConfigError::Invalid { parameter: "worker_count", .. })
        ));
        assert!(matches!(
            minimal().batch_size(Some(0)).build(),
            Err(ConfigError::Invalid { parameter: "batch_size", .. })
        ));
        assert!(matches!(
            minimal().chain_id(" ").build(),
            Err(ConfigError::Invalid { parameter: "chain_id", .. })
        ));
    }

    #[test]
    fn job_overrides_take_precedence_in_metric_params() {
        let config = minimal().chain_id("H").residue_floor(44).build().unwrap();
        let plain = StructureJob::new("d1", "d1.pdb");
        let params = config.metric_params_for(&plain);
        assert_eq!(params.chain_id, "H");
        assert_eq!(params.residue_floor, 44);

        let overridden = plain.with_chain("L").with_residue_floor(1);
        let params = config.metric_params_for(&overridden);
        assert_eq!(params.chain_id, "L");
        assert_eq!(params.residue_floor, 1);
        assert_eq!(
            config.report_path_for(&overridden),
            PathBuf::from("reports").join("d1.xml")
        );
    }
}
