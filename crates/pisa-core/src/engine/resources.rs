use crate::core::io::settings::{ResourceSettings, SettingsError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

const MEMINFO_PATH: &str = "/proc/meminfo";
const FALLBACK_MEMORY_GIB: f64 = 4.0;
const MIB: u64 = 1024 * 1024;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub scratch_dir: PathBuf,
    pub probe_bytes: u64,
    pub per_worker_gib: f64,
    pub worker_ceiling: usize,
    /// Memory budgeted per queued structure when sizing batches.
    pub job_footprint_mb: f64,
    pub run_probe: bool,
}

impl EstimatorConfig {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            probe_bytes: 64 * MIB,
            per_worker_gib: 1.5,
            worker_ceiling: 32,
            job_footprint_mb: 100.0,
            run_probe: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostResources {
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub total_memory_bytes: Option<u64>,
    pub available_memory_bytes: u64,
}

impl HostResources {
    pub fn detect() -> Self {
        let (total, available) = match fs::read_to_string(MEMINFO_PATH) {
            Ok(content) => parse_meminfo(&content),
            Err(e) => {
                warn!(error = %e, "Cannot read memory information; assuming {} GB.", FALLBACK_MEMORY_GIB);
                (None, None)
            }
        };
        Self {
            physical_cores: num_cpus::get_physical().max(1),
            logical_cores: num_cpus::get().max(1),
            total_memory_bytes: total,
            available_memory_bytes: available
                .or(total)
                .unwrap_or((FALLBACK_MEMORY_GIB * GIB) as u64),
        }
    }

    pub fn available_gib(&self) -> f64 {
        self.available_memory_bytes as f64 / GIB
    }

    pub fn available_mb(&self) -> f64 {
        self.available_memory_bytes as f64 / MIB as f64
    }
}

/// Extracts `MemTotal` and `MemAvailable` (in bytes) from `/proc/meminfo` text.
pub fn parse_meminfo(content: &str) -> (Option<u64>, Option<u64>) {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kib * 1024)
        })
    };
    (field("MemTotal"), field("MemAvailable"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub write_mb_per_s: f64,
    pub read_mb_per_s: f64,
}

/// Scratch file removed on drop, whatever path the probe exits through.
struct ProbeFile {
    path: PathBuf,
}

impl ProbeFile {
    fn in_dir(scratch_dir: &Path) -> Self {
        Self {
            path: scratch_dir.join(format!(".pisabatch-probe-{}", std::process::id())),
        }
    }
}

impl Drop for ProbeFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove probe file.");
            }
        }
    }
}

fn mb_per_second(bytes: u64, seconds: f64) -> f64 {
    bytes as f64 / MIB as f64 / seconds.max(1e-9)
}

/// Writes `bytes` to a scratch file with a synchronous flush, then reads it back.
pub fn probe_throughput(scratch_dir: &Path, bytes: u64) -> io::Result<Throughput> {
    fs::create_dir_all(scratch_dir)?;
    let probe = ProbeFile::in_dir(scratch_dir);

    let block = vec![0u8; MIB as usize];
    let start = Instant::now();
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&probe.path)?;
        let mut remaining = bytes;
        while remaining > 0 {
            let chunk = remaining.min(MIB) as usize;
            file.write_all(&block[..chunk])?;
            remaining -= chunk as u64;
        }
        file.sync_all()?;
    }
    let write_secs = start.elapsed().as_secs_f64();

    let start = Instant::now();
    let mut file = File::open(&probe.path)?;
    let mut buffer = vec![0u8; MIB as usize];
    let mut read = 0u64;
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        read += n as u64;
    }
    let read_secs = start.elapsed().as_secs_f64();

    Ok(Throughput {
        write_mb_per_s: mb_per_second(bytes, write_secs),
        read_mb_per_s: mb_per_second(read, read_secs),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEstimate {
    pub host: HostResources,
    pub throughput: Option<Throughput>,
    pub worker_count: usize,
    pub batch_size: usize,
}

/// `max(1, min(physical_cores, floor(available_gib / per_worker_gib), ceiling))`.
pub fn recommend_workers(
    physical_cores: usize,
    available_gib: f64,
    per_worker_gib: f64,
    ceiling: usize,
) -> usize {
    let by_memory = if per_worker_gib > 0.0 {
        (available_gib / per_worker_gib).floor().max(0.0) as usize
    } else {
        usize::MAX
    };
    physical_cores.min(by_memory).min(ceiling).max(1)
}

pub fn recommend_batch_size(available_mb: f64, job_footprint_mb: f64) -> usize {
    if !(job_footprint_mb > 0.0) {
        return 1;
    }
    ((available_mb * 0.8 / job_footprint_mb).floor() as usize).max(1)
}

/// Inspects the host and sizes the worker pool and batches.
///
/// A failed throughput probe is not fatal: the estimate then caps workers by core count
/// only and records no throughput.
pub fn estimate(config: &EstimatorConfig) -> ResourceEstimate {
    estimate_for_host(HostResources::detect(), config)
}

pub fn estimate_for_host(host: HostResources, config: &EstimatorConfig) -> ResourceEstimate {
    let throughput = if config.run_probe {
        match probe_throughput(&config.scratch_dir, config.probe_bytes) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(
                    dir = %config.scratch_dir.display(),
                    error = %e,
                    "Disk throughput probe failed; sizing workers by core count only."
                );
                None
            }
        }
    } else {
        None
    };

    let worker_count = match throughput {
        Some(_) => recommend_workers(
            host.physical_cores,
            host.available_gib(),
            config.per_worker_gib,
            config.worker_ceiling,
        ),
        None if config.run_probe => host.physical_cores.clamp(1, config.worker_ceiling.max(1)),
        None => recommend_workers(
            host.physical_cores,
            host.available_gib(),
            config.per_worker_gib,
            config.worker_ceiling,
        ),
    };
    let batch_size = recommend_batch_size(host.available_mb(), config.job_footprint_mb);

    info!(
        physical_cores = host.physical_cores,
        available_gib = format!("{:.2}", host.available_gib()),
        worker_count,
        batch_size,
        "Resource estimate complete."
    );

    ResourceEstimate {
        host,
        throughput,
        worker_count,
        batch_size,
    }
}

impl ResourceEstimate {
    pub fn to_settings(&self) -> ResourceSettings {
        ResourceSettings {
            max_workers: self.worker_count,
            batch_size: Some(self.batch_size),
        }
    }

    /// Human-readable lines describing how the estimate was reached.
    pub fn notes(&self) -> Vec<String> {
        let mut notes = vec![
            format!("Physical CPU cores: {}", self.host.physical_cores),
            format!("Logical CPU cores: {}", self.host.logical_cores),
            format!("Available memory: {:.2} GB", self.host.available_gib()),
        ];
        if let Some(total) = self.host.total_memory_bytes {
            notes.push(format!("Total memory: {:.2} GB", total as f64 / GIB));
        }
        match self.throughput {
            Some(t) => {
                notes.push(format!("Disk write speed: {:.2} MB/s", t.write_mb_per_s));
                notes.push(format!("Disk read speed: {:.2} MB/s", t.read_mb_per_s));
            }
            None => notes.push("Disk throughput: not measured".to_string()),
        }
        notes
    }

    pub fn write_report(&self, path: &Path) -> Result<(), SettingsError> {
        self.to_settings().write_to(path, &self.notes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn host(cores: usize, available_gib: f64) -> HostResources {
        HostResources {
            physical_cores: cores,
            logical_cores: cores * 2,
            total_memory_bytes: None,
            available_memory_bytes: (available_gib * GIB) as u64,
        }
    }

    #[test]
    fn parse_meminfo_reads_kib_fields() {
        let text = "MemTotal:       16384000 kB\nMemFree:  100 kB\nMemAvailable:    8192000 kB\n";
        assert_eq!(
            parse_meminfo(text),
            (Some(16_384_000 * 1024), Some(8_192_000 * 1024))
        );
        assert_eq!(parse_meminfo("MemTotal: 1024 kB"), (Some(1024 * 1024), None));
        assert_eq!(parse_meminfo("garbage"), (None, None));
    }

    #[test]
    fn workers_are_bounded_by_cores_memory_and_ceiling() {
        assert_eq!(recommend_workers(16, 6.0, 1.5, 32), 4);
        assert_eq!(recommend_workers(4, 64.0, 1.5, 32), 4);
        assert_eq!(recommend_workers(128, 512.0, 1.5, 32), 32);
        assert_eq!(recommend_workers(8, 1.0, 1.5, 32), 1);
    }

    #[test]
    fn batch_size_uses_eighty_percent_of_available_memory() {
        assert_eq!(recommend_batch_size(10_000.0, 100.0), 80);
        assert_eq!(recommend_batch_size(50.0, 100.0), 1);
    }

    #[test]
    fn probe_measures_and_removes_scratch_file() {
        let dir = tempdir().unwrap();
        let t = probe_throughput(dir.path(), 2 * MIB).unwrap();
        assert!(t.write_mb_per_s > 0.0);
        assert!(t.read_mb_per_s > 0.0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn scratch_file_is_removed_when_measurement_fails_midway() {
        fn failing_measurement(scratch_dir: &Path) -> io::Result<Throughput> {
            let scratch = ProbeFile::in_dir(scratch_dir);
            fs::write(&scratch.path, vec![0u8; 4096])?;
            assert!(scratch.path.exists());
            Err(io::Error::other("no space left on device"))
        }

        let dir = tempdir().unwrap();
        let err = failing_measurement(dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
        assert!(!ProbeFile::in_dir(dir.path()).path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn probe_failure_falls_back_to_core_count() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();

        let mut config = EstimatorConfig::new(blocker.join("scratch"));
        config.probe_bytes = MIB;
        let estimate = estimate_for_host(host(6, 2.0), &config);
        assert!(estimate.throughput.is_none());
        assert_eq!(estimate.worker_count, 6);
    }

    #[test]
    fn estimate_without_probe_still_applies_memory_cap() {
        let mut config = EstimatorConfig::new("unused");
        config.run_probe = false;
        let estimate = estimate_for_host(host(16, 3.0), &config);
        assert_eq!(estimate.worker_count, 2);
        assert!(estimate.batch_size >= 1);
    }

    #[test]
    fn estimate_report_is_a_valid_settings_file() {
        let dir = tempdir().unwrap();
        let mut config = EstimatorConfig::new(dir.path());
        config.probe_bytes = MIB;
        let estimate = estimate_for_host(host(8, 12.0), &config);
        assert_eq!(estimate.worker_count, 8);

        let path = dir.path().join("compute_settings.txt");
        estimate.write_report(&path).unwrap();
        let settings = ResourceSettings::from_path(&path).unwrap();
        assert_eq!(settings, estimate.to_settings());
    }
}
