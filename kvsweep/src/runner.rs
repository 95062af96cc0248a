//! Trial runner: executes one trial against the external benchmark

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ProcessError;
use crate::parser::parse_output;
use crate::record::MeasurementRecord;
use crate::trial::{BenchmarkBinary, TrialDescriptor};

/// Longest stderr excerpt carried in an error
const STDERR_EXCERPT: usize = 2048;

/// Something that can turn a trial descriptor into a measurement record
#[async_trait]
pub trait TrialExecutor: Send + Sync {
    async fn execute(&self, trial: &TrialDescriptor) -> Result<MeasurementRecord, ProcessError>;
}

/// Retry configuration for a single trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on any single delay in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after `attempt` (1-based) failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }
}

/// Runner settings threaded in from the configuration
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    pub binary: BenchmarkBinary,
    /// No limit when `None`
    pub timeout: Option<Duration>,
    pub retry: RetryConfig,
}

/// Runs trials by spawning the benchmark executable
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    async fn run_once(&self, trial: &TrialDescriptor) -> Result<MeasurementRecord, ProcessError> {
        let invocation = trial.invocation(&self.config.binary);
        info!("$ {}", invocation);

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: invocation.program.display().to_string(),
                source,
            })?;

        let waiting = child.wait_with_output();
        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, waiting)
                .await
                .map_err(|_| ProcessError::Timeout {
                    trial: trial.to_string(),
                    after: limit,
                })?,
            None => waiting.await,
        }
        .map_err(|source| ProcessError::Spawn {
            program: invocation.program.display().to_string(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(trial = %trial, "benchmark stderr: {}", stderr.trim());
        }

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit {
                trial: trial.to_string(),
                status: output.status.to_string(),
                stderr: excerpt(&stderr),
            });
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl TrialExecutor for ProcessRunner {
    async fn execute(&self, trial: &TrialDescriptor) -> Result<MeasurementRecord, ProcessError> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.run_once(trial).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry.delay_after(attempt);
                    warn!(
                        trial = %trial,
                        attempt,
                        max_attempts,
                        "trial failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    match trimmed.char_indices().nth(STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Stage;
    use crate::trial::Distribution;
    use std::path::PathBuf;

    #[test]
    fn test_retry_delay_backoff() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
        };

        assert_eq!(retry.delay_after(1), Duration::from_millis(100));
        assert_eq!(retry.delay_after(2), Duration::from_millis(200));
        assert_eq!(retry.delay_after(3), Duration::from_millis(350));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(STDERR_EXCERPT + 10);
        assert!(excerpt(&long).ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = ProcessRunner::new(RunnerConfig {
            binary: BenchmarkBinary {
                program: PathBuf::from("/nonexistent/kvsweep-test/ycsb"),
                workload_dir: PathBuf::from("workloads"),
            },
            timeout: Some(Duration::from_secs(1)),
            retry: RetryConfig {
                max_attempts: 3,
                ..RetryConfig::default()
            },
        });
        let trial = TrialDescriptor::new("rwl_db", "a", 1, Distribution::Uniform);

        let err = runner.execute(&trial).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("ycsb");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn runner(program: PathBuf, timeout: Option<Duration>, attempts: u32) -> ProcessRunner {
            ProcessRunner::new(RunnerConfig {
                binary: BenchmarkBinary {
                    program,
                    workload_dir: PathBuf::from("workloads"),
                },
                timeout,
                retry: RetryConfig {
                    max_attempts: attempts,
                    base_delay_ms: 1,
                    max_delay_ms: 5,
                    backoff_multiplier: 2.0,
                },
            })
        }

        #[tokio::test]
        async fn test_successful_trial_is_parsed() {
            let dir = TempDir::new().unwrap();
            let program = script(
                &dir,
                "echo \"Load runtime(sec): 1.5\"\necho \"Run throughput(ops/sec): 2000000\"",
            );
            let trial = TrialDescriptor::new("rwl_db", "a", 2, Distribution::Zipfian);

            let record = runner(program, Some(Duration::from_secs(10)), 1)
                .execute(&trial)
                .await
                .unwrap();

            assert_eq!(record.get(Stage::Load, "runtime"), Some(1.5));
            assert_eq!(record.get(Stage::Run, "throughput"), Some(2_000_000.0));
            assert_eq!(record.get(Stage::Run, "runtime"), None);
        }

        #[tokio::test]
        async fn test_non_zero_exit_fails() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "echo boom >&2\nexit 3");
            let trial = TrialDescriptor::new("rwl_db", "a", 1, Distribution::Uniform);

            let err = runner(program, None, 2).execute(&trial).await.unwrap_err();
            match err {
                ProcessError::NonZeroExit { stderr, .. } => assert_eq!(stderr, "boom"),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_hung_trial_times_out() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "sleep 5");
            let trial = TrialDescriptor::new("rwl_db", "a", 1, Distribution::Uniform);

            let err = runner(program, Some(Duration::from_millis(100)), 1)
                .execute(&trial)
                .await
                .unwrap_err();
            assert!(matches!(err, ProcessError::Timeout { .. }));
        }
    }
}
