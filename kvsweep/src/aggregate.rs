//! Aggregator: reduces repeated trials into per-metric summaries

use std::collections::BTreeMap;
use std::path::Path;

use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;
use crate::record::{MeasurementRecord, Stage};
use crate::store::{Bucket, BucketSummary, FilteredStore, MetricSummary, RawStore, StageSummary};

/// Decimal digits kept in every summary
pub const PRECISION: i32 = 3;

/// A metric that had no non-null sample in its bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationGap {
    pub bucket: Bucket,
    pub stage: Stage,
    pub metric: String,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationReport {
    pub buckets: usize,
    pub gaps: Vec<AggregationGap>,
}

fn round(value: f64) -> f64 {
    let scale = 10f64.powi(PRECISION);
    (value * scale).round() / scale
}

/// Mean and sample standard deviation of the non-null samples, or `None`
/// when every sample is null
pub fn summarize(samples: &[Option<f64>]) -> Option<MetricSummary> {
    let values: Vec<f64> = samples.iter().flatten().copied().collect();
    if values.is_empty() {
        return None;
    }

    let mean = values.iter().mean();
    let std = if values.len() > 1 {
        Some(round(values.iter().std_dev()))
    } else {
        None
    };

    Some(MetricSummary {
        mean: round(mean),
        std,
    })
}

/// Collect one stage of every record into metric → per-trial samples
fn stage_table(records: &[MeasurementRecord], stage: Stage) -> BTreeMap<&str, Vec<Option<f64>>> {
    let mut table: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        for (metric, value) in record.stage(stage) {
            let column = table.entry(metric.as_str()).or_default();
            // Trials that never mentioned the metric count as null
            column.resize(index, None);
            column.push(*value);
        }
    }
    for column in table.values_mut() {
        column.resize(records.len(), None);
    }
    table
}

/// Summarize one raw bucket
pub fn summarize_bucket(records: &[MeasurementRecord]) -> BucketSummary {
    let mut summary = BucketSummary::default();
    for stage in Stage::ALL {
        let reduced: StageSummary = stage_table(records, stage)
            .into_iter()
            .map(|(metric, samples)| (metric.to_string(), summarize(&samples)))
            .collect();
        *summary.stage_mut(stage) = reduced;
    }
    summary
}

/// Summarize every bucket of `raw` into `filtered`, replacing existing summaries
pub fn aggregate_into(raw: &RawStore, filtered: &mut FilteredStore) -> AggregationReport {
    let mut report = AggregationReport::default();

    for (bucket, records) in raw.buckets() {
        let summary = summarize_bucket(records);

        for stage in Stage::ALL {
            for (metric, value) in summary.stage(stage) {
                if value.is_none() {
                    warn!(bucket = %bucket, stage = %stage, metric, "no samples to aggregate");
                    report.gaps.push(AggregationGap {
                        bucket: bucket.clone(),
                        stage,
                        metric: metric.clone(),
                    });
                }
            }
        }

        debug!(bucket = %bucket, trials = records.len(), "aggregated bucket");
        filtered.put(&bucket, summary);
        report.buckets += 1;
    }

    report
}

/// Reload the raw store, aggregate it, and merge the result into the filtered store
pub fn run(raw_path: &Path, filtered_path: &Path) -> PersistenceResult<AggregationReport> {
    let raw = RawStore::load(raw_path)?;
    let mut filtered = FilteredStore::load(filtered_path)?;

    let report = aggregate_into(&raw, &mut filtered);
    filtered.save(filtered_path)?;

    info!(
        "Aggregated {} buckets from {} into {} ({} gaps)",
        report.buckets,
        raw_path.display(),
        filtered_path.display(),
        report.gaps.len()
    );
    Ok(report)
}
