//! Raw store: every repeated trial, append-only
//!
//! Layout: store → workload → distribution → thread count → [record, ...].
//! Records are kept in execution order and never rewritten.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{load_document, save_document, Bucket};
use crate::error::PersistenceResult;
use crate::record::MeasurementRecord;
use crate::trial::{Distribution, TrialDescriptor};

type ThreadRuns = BTreeMap<u32, Vec<MeasurementRecord>>;
type DistributionRuns = BTreeMap<Distribution, ThreadRuns>;
type WorkloadRuns = BTreeMap<String, DistributionRuns>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawStore {
    stores: BTreeMap<String, WorkloadRuns>,
}

impl RawStore {
    pub fn load(path: &Path) -> PersistenceResult<Self> {
        load_document(path)
    }

    pub fn save(&self, path: &Path) -> PersistenceResult<()> {
        save_document(path, self)
    }

    /// Append a record, creating the key path without touching its siblings
    pub fn push(&mut self, bucket: &Bucket, record: MeasurementRecord) {
        self.stores
            .entry(bucket.store.clone())
            .or_default()
            .entry(bucket.workload.clone())
            .or_default()
            .entry(bucket.distribution)
            .or_default()
            .entry(bucket.threads)
            .or_default()
            .push(record);
    }

    pub fn records(&self, bucket: &Bucket) -> &[MeasurementRecord] {
        self.stores
            .get(&bucket.store)
            .and_then(|w| w.get(&bucket.workload))
            .and_then(|d| d.get(&bucket.distribution))
            .and_then(|t| t.get(&bucket.threads))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All buckets in key order
    pub fn buckets(&self) -> impl Iterator<Item = (Bucket, &[MeasurementRecord])> + '_ {
        self.stores.iter().flat_map(|(store, workloads)| {
            workloads.iter().flat_map(move |(workload, distributions)| {
                distributions.iter().flat_map(move |(distribution, threads)| {
                    threads.iter().map(move |(count, records)| {
                        (
                            Bucket::new(store.as_str(), workload.as_str(), *distribution, *count),
                            records.as_slice(),
                        )
                    })
                })
            })
        })
    }

    /// Total number of records across all buckets
    pub fn len(&self) -> usize {
        self.buckets().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-merge-write a single trial result into the raw store at `path`
pub fn append(path: &Path, trial: &TrialDescriptor, record: MeasurementRecord) -> PersistenceResult<()> {
    let mut store = RawStore::load(path)?;
    let bucket = Bucket::from(trial);
    store.push(&bucket, record);
    store.save(path)?;

    debug!(
        bucket = %bucket,
        trials = store.records(&bucket).len(),
        "appended trial to {}",
        path.display()
    );
    Ok(())
}
