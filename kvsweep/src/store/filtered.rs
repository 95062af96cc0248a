//! Filtered store: one statistical summary per bucket
//!
//! Layout: store → workload → thread count → distribution → stage → metric →
//! `{"mean", "std"}`. A metric whose samples were all null is stored as `null`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{load_document, save_document, Bucket};
use crate::error::PersistenceResult;
use crate::record::Stage;
use crate::trial::Distribution;

/// Mean and sample standard deviation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    /// `None` with fewer than two samples
    pub std: Option<f64>,
}

/// Metric name to summary; `None` marks an aggregation gap
pub type StageSummary = BTreeMap<String, Option<MetricSummary>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    #[serde(default)]
    pub load: StageSummary,
    #[serde(default)]
    pub run: StageSummary,
}

impl BucketSummary {
    pub fn stage(&self, stage: Stage) -> &StageSummary {
        match stage {
            Stage::Load => &self.load,
            Stage::Run => &self.run,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageSummary {
        match stage {
            Stage::Load => &mut self.load,
            Stage::Run => &mut self.run,
        }
    }
}

type DistributionSummaries = BTreeMap<Distribution, BucketSummary>;
type ThreadSummaries = BTreeMap<u32, DistributionSummaries>;
type WorkloadSummaries = BTreeMap<String, ThreadSummaries>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilteredStore {
    stores: BTreeMap<String, WorkloadSummaries>,
}

impl FilteredStore {
    pub fn load(path: &Path) -> PersistenceResult<Self> {
        load_document(path)
    }

    pub fn save(&self, path: &Path) -> PersistenceResult<()> {
        save_document(path, self)
    }

    /// Insert or replace the summary of one bucket
    pub fn put(&mut self, bucket: &Bucket, summary: BucketSummary) {
        self.stores
            .entry(bucket.store.clone())
            .or_default()
            .entry(bucket.workload.clone())
            .or_default()
            .entry(bucket.threads)
            .or_default()
            .insert(bucket.distribution, summary);
    }

    pub fn get(&self, bucket: &Bucket) -> Option<&BucketSummary> {
        self.stores
            .get(&bucket.store)?
            .get(&bucket.workload)?
            .get(&bucket.threads)?
            .get(&bucket.distribution)
    }

    /// Store identities in sorted order
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn has_workload(&self, store: &str, workload: &str) -> bool {
        self.stores
            .get(store)
            .map_or(false, |w| w.contains_key(workload))
    }

    /// Ascending thread counts that hold a summary for `distribution`
    pub fn thread_counts(&self, store: &str, workload: &str, distribution: Distribution) -> Vec<u32> {
        self.stores
            .get(store)
            .and_then(|w| w.get(workload))
            .map(|threads| {
                threads
                    .iter()
                    .filter(|(_, d)| d.contains_key(&distribution))
                    .map(|(count, _)| *count)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All buckets in key order
    pub fn buckets(&self) -> impl Iterator<Item = (Bucket, &BucketSummary)> + '_ {
        self.stores.iter().flat_map(|(store, workloads)| {
            workloads.iter().flat_map(move |(workload, threads)| {
                threads.iter().flat_map(move |(count, distributions)| {
                    distributions.iter().map(move |(distribution, summary)| {
                        (
                            Bucket::new(store.as_str(), workload.as_str(), *distribution, *count),
                            summary,
                        )
                    })
                })
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Read-merge-write one bucket summary into the filtered store at `path`
pub fn put(path: &Path, bucket: &Bucket, summary: BucketSummary) -> PersistenceResult<()> {
    let mut store = FilteredStore::load(path)?;
    store.put(bucket, summary);
    store.save(path)
}
