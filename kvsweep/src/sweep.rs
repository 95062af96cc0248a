//! Sweep driver: runs every configured trial and persists each result at once

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ConfigError, ConfigResult, Result};
use crate::runner::TrialExecutor;
use crate::store::raw;
use crate::trial::{Distribution, TrialDescriptor};

/// What to do when a single trial fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the sweep and return the error
    #[default]
    Abort,
    /// Log the failure and move on to the next trial
    Skip,
}

/// Parameters of one sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub stores: Vec<String>,
    pub workloads: Vec<String>,
    pub max_threads: u32,
    pub trials: u32,
    pub distributions: Vec<Distribution>,
    pub failure_policy: FailurePolicy,
    pub raw_path: PathBuf,
    pub show_progress: bool,
}

impl SweepConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, value: String| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        };

        if self.stores.is_empty() {
            return Err(invalid("sweep.stores", "[]".to_string()));
        }
        if self.workloads.is_empty() {
            return Err(invalid("sweep.workloads", "[]".to_string()));
        }
        if self.max_threads == 0 {
            return Err(invalid("sweep.max_threads", "0".to_string()));
        }
        if self.trials == 0 {
            return Err(invalid("sweep.trials", "0".to_string()));
        }
        if self.distributions.is_empty() {
            return Err(invalid("sweep.distributions", "[]".to_string()));
        }
        Ok(())
    }

    /// Every trial in execution order: thread count, store, workload,
    /// distribution, repetition
    pub fn plan(&self) -> Vec<TrialDescriptor> {
        let mut plan = Vec::with_capacity(self.planned());
        for threads in 1..=self.max_threads {
            for store in &self.stores {
                for workload in &self.workloads {
                    for &distribution in &self.distributions {
                        let trial = TrialDescriptor::new(store.as_str(), workload.as_str(), threads, distribution);
                        for _ in 0..self.trials {
                            plan.push(trial.clone());
                        }
                    }
                }
            }
        }
        plan
    }

    pub fn planned(&self) -> usize {
        self.max_threads as usize
            * self.stores.len()
            * self.workloads.len()
            * self.distributions.len()
            * self.trials as usize
    }
}

/// Outcome of a sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub planned: usize,
    pub completed: usize,
    /// Trials skipped under [`FailurePolicy::Skip`], with the reason
    pub failed: Vec<(String, String)>,
}

fn progress_bar(config: &SweepConfig) -> ProgressBar {
    if !config.show_progress {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(config.planned() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Run the sweep, appending each result to the raw store before the next
/// trial starts, so an interrupted sweep keeps everything it finished.
pub async fn run<E: TrialExecutor>(config: &SweepConfig, executor: &E) -> Result<SweepReport> {
    config.validate()?;

    let started_at = Utc::now();
    let plan = config.plan();
    info!(
        "Sweeping {} trials ({} stores, {} workloads, 1..={} threads, {} distributions, {} repetitions)",
        plan.len(),
        config.stores.len(),
        config.workloads.len(),
        config.max_threads,
        config.distributions.len(),
        config.trials
    );

    let pb = progress_bar(config);
    let mut completed = 0;
    let mut failed = Vec::new();

    for trial in &plan {
        pb.set_message(trial.to_string());

        match executor.execute(trial).await {
            Ok(record) => {
                raw::append(&config.raw_path, trial, record)?;
                completed += 1;
            }
            Err(e) => match config.failure_policy {
                FailurePolicy::Abort => {
                    pb.abandon_with_message(format!("{} failed", trial));
                    error!(trial = %trial, "aborting sweep: {}", e);
                    return Err(e.into());
                }
                FailurePolicy::Skip => {
                    warn!(trial = %trial, "skipping failed trial: {}", e);
                    failed.push((trial.to_string(), e.to_string()));
                }
            },
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let report = SweepReport {
        started_at,
        finished_at: Utc::now(),
        planned: plan.len(),
        completed,
        failed,
    };
    info!(
        "Sweep finished: {}/{} trials recorded, {} skipped, in {}s",
        report.completed,
        report.planned,
        report.failed.len(),
        (report.finished_at - report.started_at).num_seconds()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(stores: &[&str], workloads: &[&str], max_threads: u32, trials: u32) -> SweepConfig {
        SweepConfig {
            stores: stores.iter().map(|s| s.to_string()).collect(),
            workloads: workloads.iter().map(|s| s.to_string()).collect(),
            max_threads,
            trials,
            distributions: Distribution::DEFAULT_SWEEP.to_vec(),
            failure_policy: FailurePolicy::Abort,
            raw_path: PathBuf::from("raw_data.json"),
            show_progress: false,
        }
    }

    #[test]
    fn test_plan_order() {
        let plan = config(&["A", "B"], &["a"], 2, 2).plan();
        let order: Vec<String> = plan.iter().map(|t| t.to_string()).collect();

        assert_eq!(
            order,
            vec![
                "A/a/1/uniform",
                "A/a/1/uniform",
                "A/a/1/zipfian",
                "A/a/1/zipfian",
                "B/a/1/uniform",
                "B/a/1/uniform",
                "B/a/1/zipfian",
                "B/a/1/zipfian",
                "A/a/2/uniform",
                "A/a/2/uniform",
                "A/a/2/zipfian",
                "A/a/2/zipfian",
                "B/a/2/uniform",
                "B/a/2/uniform",
                "B/a/2/zipfian",
                "B/a/2/zipfian",
            ]
        );
    }

    #[test]
    fn test_planned_matches_plan() {
        let sweep = config(&["A", "B", "C"], &["a", "b"], 3, 4);
        assert_eq!(sweep.planned(), sweep.plan().len());
        assert_eq!(sweep.planned(), 3 * 3 * 2 * 2 * 4);
    }

    #[test]
    fn test_validate() {
        assert!(config(&["A"], &["a"], 1, 1).validate().is_ok());
        assert!(config(&[], &["a"], 1, 1).validate().is_err());
        assert!(config(&["A"], &[], 1, 1).validate().is_err());
        assert!(config(&["A"], &["a"], 0, 1).validate().is_err());
        assert!(config(&["A"], &["a"], 1, 0).validate().is_err());

        let mut no_distributions = config(&["A"], &["a"], 1, 1);
        no_distributions.distributions.clear();
        assert!(no_distributions.validate().is_err());
    }
}
