//! Configuration management for kvsweep
//!
//! Settings come from a TOML file, then `KVSWEEP_*` environment variables,
//! then command-line flags applied by the binary. Every section has defaults
//! matching the layout of a checkout next to the benchmark build directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chart::{ChartRenderer, ChartTask, ImageFormat};
use crate::error::{ConfigError, ConfigResult};
use crate::runner::{RetryConfig, RunnerConfig};
use crate::sweep::{FailurePolicy, SweepConfig};
use crate::trial::{BenchmarkBinary, Distribution};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub benchmark: BenchmarkConfig,
    pub sweep: SweepSettings,
    pub charts: ChartsConfig,
}

/// Locations of the pipeline's documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub filtered_data: PathBuf,
    pub graphs_dir: PathBuf,
}

/// External benchmark settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub program: PathBuf,
    pub workload_dir: PathBuf,
    /// Per-trial limit in seconds; unset means no limit
    pub timeout_secs: Option<u64>,
    pub retry: RetryConfig,
}

/// Sweep defaults; the command line overrides the store and workload lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub stores: Vec<String>,
    pub workloads: Vec<String>,
    pub max_threads: u32,
    pub trials: u32,
    pub distributions: Vec<Distribution>,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Thread count marked with a vertical line; 0 disables it
    pub reference_threads: u32,
    /// Empty means one chart per workload, stage, metric and distribution
    pub tasks: Vec<ChartTask>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("../raw_data.json"),
            filtered_data: PathBuf::from("../filtered_data.json"),
            graphs_dir: PathBuf::from("../graphs"),
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let binary = BenchmarkBinary::default();
        Self {
            program: binary.program,
            workload_dir: binary.workload_dir,
            timeout_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            stores: Vec::new(),
            workloads: Vec::new(),
            max_threads: 1,
            trials: 1,
            distributions: Distribution::DEFAULT_SWEEP.to_vec(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            width: 1024,
            height: 768,
            reference_threads: 6,
            tasks: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_string_lossy().to_string(),
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback order: file -> env -> defaults
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) if path.as_ref().exists() => Config::from_file(path)?,
            Some(path) => {
                return Err(ConfigError::FileNotFound {
                    path: path.as_ref().to_string_lossy().to_string(),
                })
            }
            None => match Self::default_config_path() {
                Ok(path) if path.exists() => Config::from_file(path)?,
                _ => Config::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KVSWEEP_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid = |field: &str, value: String| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        };

        if let Some(path) = lookup("KVSWEEP_RAW_DATA") {
            self.paths.raw_data = PathBuf::from(path);
        }
        if let Some(path) = lookup("KVSWEEP_FILTERED_DATA") {
            self.paths.filtered_data = PathBuf::from(path);
        }
        if let Some(path) = lookup("KVSWEEP_GRAPHS_DIR") {
            self.paths.graphs_dir = PathBuf::from(path);
        }
        if let Some(program) = lookup("KVSWEEP_BENCHMARK") {
            self.benchmark.program = PathBuf::from(program);
        }
        if let Some(dir) = lookup("KVSWEEP_WORKLOAD_DIR") {
            self.benchmark.workload_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("KVSWEEP_TIMEOUT_SECS") {
            self.benchmark.timeout_secs = Some(
                secs.parse()
                    .map_err(|_| invalid("KVSWEEP_TIMEOUT_SECS", secs.clone()))?,
            );
        }
        if let Some(policy) = lookup("KVSWEEP_FAILURE_POLICY") {
            self.sweep.failure_policy = match policy.to_ascii_lowercase().as_str() {
                "abort" => FailurePolicy::Abort,
                "skip" => FailurePolicy::Skip,
                _ => return Err(invalid("KVSWEEP_FAILURE_POLICY", policy)),
            };
        }
        if let Some(list) = lookup("KVSWEEP_DISTRIBUTIONS") {
            self.sweep.distributions = list
                .split(',')
                .map(|d| d.trim().parse())
                .collect::<ConfigResult<Vec<Distribution>>>()?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sweep.max_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep.max_threads".to_string(),
                value: "0".to_string(),
            });
        }

        if self.sweep.trials == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep.trials".to_string(),
                value: "0".to_string(),
            });
        }

        if self.sweep.distributions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sweep.distributions".to_string(),
                value: "[]".to_string(),
            });
        }

        if self.benchmark.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "benchmark.timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.benchmark.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "benchmark.retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }

        if self.benchmark.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "benchmark.retry.backoff_multiplier".to_string(),
                value: self.benchmark.retry.backoff_multiplier.to_string(),
            });
        }

        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "charts.width/height".to_string(),
                value: format!("{}x{}", self.charts.width, self.charts.height),
            });
        }

        for task in &self.charts.tasks {
            if task.stores.is_empty() {
                return Err(ConfigError::EmptyTask { task: task.id() });
            }
            task.title()?;
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("kvsweep").join("kvsweep.toml"))
            .ok_or_else(|| ConfigError::ValidationFailed {
                reason: "Unable to determine config directory".to_string(),
            })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|_| ConfigError::ValidationFailed {
                reason: format!("Unable to create config directory: {}", parent.display()),
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationFailed { reason: e.to_string() })?;

        fs::write(path, content).map_err(|_| ConfigError::PermissionDenied {
            path: path.to_string_lossy().to_string(),
        })?;

        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            binary: BenchmarkBinary {
                program: self.benchmark.program.clone(),
                workload_dir: self.benchmark.workload_dir.clone(),
            },
            timeout: self.benchmark.timeout_secs.map(Duration::from_secs),
            retry: self.benchmark.retry.clone(),
        }
    }

    /// Sweep parameters from the `[sweep]` section; the caller fills in
    /// anything given on the command line
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            stores: self.sweep.stores.clone(),
            workloads: self.sweep.workloads.clone(),
            max_threads: self.sweep.max_threads,
            trials: self.sweep.trials,
            distributions: self.sweep.distributions.clone(),
            failure_policy: self.sweep.failure_policy,
            raw_path: self.paths.raw_data.clone(),
            show_progress: true,
        }
    }

    pub fn renderer(&self) -> ChartRenderer {
        ChartRenderer {
            output_dir: self.paths.graphs_dir.clone(),
            format: self.charts.format,
            size: (self.charts.width, self.charts.height),
            reference_threads: Some(self.charts.reference_threads).filter(|&t| t > 0),
        }
    }
}
