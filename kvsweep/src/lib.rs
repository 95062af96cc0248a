//! kvsweep: benchmarking pipeline for key-value stores
//!
//! The pipeline has three stages, each reading and writing JSON documents on
//! disk so they can run independently:
//!
//! - [`sweep`] runs the external benchmark over every store, workload, thread
//!   count and key distribution, appending each result to the raw store
//! - [`aggregate`] folds repeated trials into mean and standard deviation in
//!   the filtered store
//! - [`chart`] projects the filtered store into error-bar plots described by
//!   chart tasks

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod error;
pub mod parser;
pub mod record;
pub mod runner;
pub mod store;
pub mod sweep;
pub mod trial;

pub use aggregate::AggregationReport;
pub use chart::{ChartRenderer, ChartTask, ImageFormat, StylePalette};
pub use config::Config;
pub use error::{ConfigError, HarnessError, PersistenceError, ProcessError, RenderError, Result};
pub use record::{MeasurementRecord, MetricKind, Stage};
pub use runner::{ProcessRunner, RetryConfig, RunnerConfig, TrialExecutor};
pub use store::{Bucket, FilteredStore, RawStore};
pub use sweep::{FailurePolicy, SweepConfig, SweepReport};
pub use trial::{BenchmarkBinary, Distribution, TrialDescriptor};
