//! Declarative chart tasks and the series they extract from the filtered store

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::record::{MetricKind, Stage};
use crate::store::{Bucket, FilteredStore};
use crate::trial::Distribution;

/// Throughput is reported in ops/sec and plotted in millions
const THROUGHPUT_SCALE: f64 = 1_000_000.0;

/// Unit shown on the y axis for a metric
pub fn unit(metric: &str) -> &'static str {
    match metric {
        MetricKind::RUNTIME => "seconds",
        MetricKind::OPERATIONS => "million-ops",
        MetricKind::THROUGHPUT => "million-ops/second",
        m if m.contains("rss") => "kilobytes",
        _ => "",
    }
}

/// Operation mix of a YCSB core workload
pub fn workload_title(workload: &str) -> ConfigResult<&'static str> {
    match workload {
        "a" => Ok("50% Reads, 50% Updates"),
        "b" => Ok("95% Reads, 5% Updates"),
        "c" => Ok("100% Reads"),
        "d" => Ok("95% Reads, 5% Inserts"),
        "e" => Ok("95% Scans, 5% Inserts"),
        "f" => Ok("50% Reads, 50% RMW"),
        _ => Err(ConfigError::UnknownWorkload {
            workload: workload.to_string(),
        }),
    }
}

fn default_distribution() -> Distribution {
    Distribution::Uniform
}

/// One figure: a metric of one stage, overlaid for several stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartTask {
    pub workload: String,
    pub stage: Stage,
    pub metric: String,
    #[serde(default = "default_distribution")]
    pub distribution: Distribution,
    pub stores: Vec<String>,
}

/// A plotted point, already scaled to the axis unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub threads: u32,
    pub mean: f64,
    /// Zero when the summary has no standard deviation
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub store: String,
    pub points: Vec<Point>,
}

/// Everything a renderer needs for one task
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub thread_counts: Vec<u32>,
    pub series: Vec<Series>,
}

impl ChartData {
    /// Highest `mean + std` across all series
    pub fn y_max(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.points.iter())
            .map(|p| p.mean + p.std)
            .fold(0.0, f64::max)
    }
}

impl ChartTask {
    pub fn new(
        workload: impl Into<String>,
        stage: Stage,
        metric: impl Into<String>,
        distribution: Distribution,
        stores: Vec<String>,
    ) -> Self {
        Self {
            workload: workload.into(),
            stage,
            metric: metric.into(),
            distribution,
            stores,
        }
    }

    /// Identifier used as the image file name
    pub fn id(&self) -> String {
        let mut parts: Vec<&str> = self.stores.iter().map(String::as_str).collect();
        parts.extend([
            self.workload.as_str(),
            self.stage.as_str(),
            self.metric.as_str(),
            self.distribution.as_str(),
        ]);
        parts.join("-")
    }

    /// (x, y) axis labels
    pub fn axes(&self) -> (String, String) {
        (
            "thread count".to_string(),
            format!("{} - {} ({})", self.stage, self.metric, unit(&self.metric)),
        )
    }

    pub fn title(&self) -> ConfigResult<&'static str> {
        workload_title(&self.workload)
    }

    fn missing(&self, path: String) -> ConfigError {
        ConfigError::MissingData {
            task: self.id(),
            path,
        }
    }

    /// Pull this task's series out of the filtered store. All stores must
    /// cover the same thread counts; a missing key path is a configuration
    /// error, a null summary is skipped.
    pub fn extract(&self, data: &FilteredStore) -> ConfigResult<ChartData> {
        let Some(first) = self.stores.first() else {
            return Err(ConfigError::EmptyTask { task: self.id() });
        };

        for store in &self.stores {
            if !data.has_workload(store, &self.workload) {
                return Err(self.missing(format!("{}/{}", store, self.workload)));
            }
        }

        let thread_counts = data.thread_counts(first, &self.workload, self.distribution);
        if thread_counts.is_empty() {
            return Err(self.missing(format!(
                "{}/{}/*/{}",
                first, self.workload, self.distribution
            )));
        }
        for store in &self.stores[1..] {
            let found = data.thread_counts(store, &self.workload, self.distribution);
            if found != thread_counts {
                return Err(ConfigError::ThreadDomainMismatch {
                    task: self.id(),
                    store: store.clone(),
                    expected: thread_counts.clone(),
                    found,
                });
            }
        }

        let scale = if self.metric == MetricKind::THROUGHPUT {
            THROUGHPUT_SCALE
        } else {
            1.0
        };

        let mut series = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            let mut points = Vec::with_capacity(thread_counts.len());
            for &threads in &thread_counts {
                let bucket = Bucket::new(store.as_str(), self.workload.as_str(), self.distribution, threads);
                let path = || {
                    format!(
                        "{}/{}/{}/{}/{}/{}",
                        store, self.workload, threads, self.distribution, self.stage, self.metric
                    )
                };

                let slot = data
                    .get(&bucket)
                    .and_then(|summary| summary.stage(self.stage).get(&self.metric))
                    .ok_or_else(|| self.missing(path()))?;

                match slot {
                    Some(summary) => points.push(Point {
                        threads,
                        mean: summary.mean / scale,
                        std: summary.std.unwrap_or(0.0) / scale,
                    }),
                    None => warn!(task = %self.id(), "no data at {}, skipping point", path()),
                }
            }
            series.push(Series {
                store: store.clone(),
                points,
            });
        }

        Ok(ChartData {
            thread_counts,
            series,
        })
    }

    /// One task per (workload, distribution, stage, metric) found in the
    /// filtered store. A task overlays the stores that report the metric at
    /// every one of their thread counts; stores with different thread-count
    /// domains go to separate tasks. Workloads without a known title are
    /// left out.
    pub fn defaults_for(data: &FilteredStore) -> Vec<ChartTask> {
        type Key = (String, Distribution, Stage, String);
        let mut coverage: BTreeMap<Key, BTreeMap<String, Vec<u32>>> = BTreeMap::new();

        for (bucket, summary) in data.buckets() {
            if workload_title(&bucket.workload).is_err() {
                continue;
            }
            for stage in Stage::ALL {
                for metric in summary.stage(stage).keys() {
                    let key = (bucket.workload.clone(), bucket.distribution, stage, metric.clone());
                    coverage
                        .entry(key)
                        .or_default()
                        .entry(bucket.store.clone())
                        .or_default()
                        .push(bucket.threads);
                }
            }
        }

        let mut tasks = Vec::new();
        for ((workload, distribution, stage, metric), stores) in coverage {
            let mut overlays: BTreeMap<Vec<u32>, Vec<String>> = BTreeMap::new();
            for (store, threads) in stores {
                if threads != data.thread_counts(&store, &workload, distribution) {
                    debug!(
                        store = %store,
                        "{}/{}/{} missing at some thread counts, left out of default chart",
                        workload, stage, metric
                    );
                    continue;
                }
                overlays.entry(threads).or_default().push(store);
            }

            for overlay in overlays.into_values() {
                tasks.push(ChartTask::new(
                    workload.clone(),
                    stage,
                    metric.clone(),
                    distribution,
                    overlay,
                ));
            }
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BucketSummary, MetricSummary};

    fn summary(throughput: Option<f64>) -> BucketSummary {
        let mut summary = BucketSummary::default();
        summary.run.insert(
            "throughput".to_string(),
            throughput.map(|mean| MetricSummary {
                mean,
                std: Some(mean / 10.0),
            }),
        );
        summary.load.insert(
            "runtime".to_string(),
            Some(MetricSummary { mean: 2.0, std: None }),
        );
        summary
    }

    fn filtered(stores: &[(&str, &[u32])]) -> FilteredStore {
        let mut data = FilteredStore::default();
        for (store, threads) in stores {
            for &t in *threads {
                data.put(
                    &Bucket::new(*store, "a", Distribution::Uniform, t),
                    summary(Some(t as f64 * 1_000_000.0)),
                );
            }
        }
        data
    }

    fn throughput_task(stores: &[&str]) -> ChartTask {
        ChartTask::new(
            "a",
            Stage::Run,
            "throughput",
            Distribution::Uniform,
            stores.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_id_axes_and_title() {
        let task = throughput_task(&["ojdkchm_db", "rwl_db"]);
        assert_eq!(task.id(), "ojdkchm_db-rwl_db-a-run-throughput-uniform");
        assert_eq!(
            task.axes(),
            (
                "thread count".to_string(),
                "run - throughput (million-ops/second)".to_string()
            )
        );
        assert_eq!(task.title().unwrap(), "50% Reads, 50% Updates");
    }

    #[test]
    fn test_unit_resolution() {
        assert_eq!(unit("throughput"), "million-ops/second");
        assert_eq!(unit("runtime"), "seconds");
        assert_eq!(unit("operations"), "million-ops");
        assert_eq!(unit("maxrss"), "kilobytes");
        assert_eq!(unit("latency"), "");
    }

    #[test]
    fn test_unknown_workload_is_config_error() {
        let mut task = throughput_task(&["rwl_db"]);
        task.workload = "z".to_string();
        assert!(matches!(task.title(), Err(ConfigError::UnknownWorkload { .. })));
    }

    #[test]
    fn test_extract_scales_throughput() {
        let data = filtered(&[("rwl_db", &[1, 2]), ("gsm_db", &[1, 2])]);
        let chart = throughput_task(&["rwl_db", "gsm_db"]).extract(&data).unwrap();

        assert_eq!(chart.thread_counts, vec![1, 2]);
        assert_eq!(chart.series.len(), 2);
        let point = chart.series[0].points[1];
        assert_eq!(point.threads, 2);
        assert!((point.mean - 2.0).abs() < 1e-9);
        assert!((point.std - 0.2).abs() < 1e-9);
        assert!((chart.y_max() - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_extract_does_not_scale_other_metrics() {
        let data = filtered(&[("rwl_db", &[1])]);
        let task = ChartTask::new(
            "a",
            Stage::Load,
            "runtime",
            Distribution::Uniform,
            vec!["rwl_db".to_string()],
        );
        let chart = task.extract(&data).unwrap();
        assert_eq!(chart.series[0].points[0].mean, 2.0);
        assert_eq!(chart.series[0].points[0].std, 0.0);
    }

    #[test]
    fn test_thread_domain_mismatch() {
        let data = filtered(&[("rwl_db", &[1, 2, 3]), ("gsm_db", &[1, 2])]);
        let err = throughput_task(&["rwl_db", "gsm_db"]).extract(&data).unwrap_err();

        match err {
            ConfigError::ThreadDomainMismatch { task, store, expected, found } => {
                assert_eq!(task, "rwl_db-gsm_db-a-run-throughput-uniform");
                assert_eq!(store, "gsm_db");
                assert_eq!(expected, vec![1, 2, 3]);
                assert_eq!(found, vec![1, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_paths() {
        let data = filtered(&[("rwl_db", &[1])]);

        let err = throughput_task(&["rwl_db", "absent_db"]).extract(&data).unwrap_err();
        assert!(matches!(err, ConfigError::MissingData { ref path, .. } if path == "absent_db/a"));

        let mut task = throughput_task(&["rwl_db"]);
        task.metric = "operations".to_string();
        let err = task.extract(&data).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingData { ref path, .. } if path == "rwl_db/a/1/uniform/run/operations")
        );

        let mut task = throughput_task(&["rwl_db"]);
        task.distribution = Distribution::Zipfian;
        assert!(matches!(task.extract(&data), Err(ConfigError::MissingData { .. })));

        assert!(matches!(
            throughput_task(&[]).extract(&data),
            Err(ConfigError::EmptyTask { .. })
        ));
    }

    #[test]
    fn test_null_summary_is_skipped() {
        let mut data = filtered(&[("rwl_db", &[1])]);
        data.put(&Bucket::new("rwl_db", "a", Distribution::Uniform, 2), summary(None));

        let chart = throughput_task(&["rwl_db"]).extract(&data).unwrap();
        assert_eq!(chart.thread_counts, vec![1, 2]);
        assert_eq!(chart.series[0].points.len(), 1);
    }

    #[test]
    fn test_default_tasks() {
        let mut data = filtered(&[("rwl_db", &[1]), ("gsm_db", &[1])]);
        data.put(&Bucket::new("rwl_db", "x", Distribution::Uniform, 1), summary(Some(1.0)));

        let tasks = ChartTask::defaults_for(&data);
        let ids: Vec<String> = tasks.iter().map(ChartTask::id).collect();
        assert_eq!(
            ids,
            vec![
                "gsm_db-rwl_db-a-load-runtime-uniform",
                "gsm_db-rwl_db-a-run-throughput-uniform",
            ]
        );
    }

    #[test]
    fn test_default_tasks_only_overlay_plottable_stores() {
        let mut data = filtered(&[("rwl_db", &[1, 2]), ("gsm_db", &[1, 2]), ("ojdkchm_db", &[1])]);
        for threads in [1, 2] {
            let bucket = Bucket::new("gsm_db", "a", Distribution::Uniform, threads);
            let mut with_rss = summary(Some(threads as f64));
            with_rss.load.insert(
                "maxrss".to_string(),
                Some(MetricSummary { mean: 2048.0, std: None }),
            );
            data.put(&bucket, with_rss);
        }

        let tasks = ChartTask::defaults_for(&data);
        let ids: Vec<String> = tasks.iter().map(ChartTask::id).collect();
        assert_eq!(
            ids,
            vec![
                "gsm_db-a-load-maxrss-uniform",
                "ojdkchm_db-a-load-runtime-uniform",
                "gsm_db-rwl_db-a-load-runtime-uniform",
                "ojdkchm_db-a-run-throughput-uniform",
                "gsm_db-rwl_db-a-run-throughput-uniform",
            ]
        );
        for task in &tasks {
            assert!(task.extract(&data).is_ok(), "{}", task.id());
        }
    }

    #[test]
    fn test_default_tasks_skip_partially_reported_metrics() {
        let mut data = filtered(&[("rwl_db", &[1, 2])]);
        let bucket = Bucket::new("rwl_db", "a", Distribution::Uniform, 2);
        let mut with_rss = summary(Some(1.0));
        with_rss.load.insert("maxrss".to_string(), None);
        data.put(&bucket, with_rss);

        let ids: Vec<String> = ChartTask::defaults_for(&data).iter().map(ChartTask::id).collect();
        assert!(!ids.iter().any(|id| id.contains("maxrss")));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_task_from_toml_defaults_to_uniform() {
        let task: ChartTask = toml::from_str(
            r#"
            workload = "a"
            stage = "run"
            metric = "throughput"
            stores = ["ojdkchm_db"]
            "#,
        )
        .unwrap();
        assert_eq!(task.distribution, Distribution::Uniform);
    }
}
