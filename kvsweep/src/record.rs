//! Measurement records produced by a single trial

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Phase of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Initial data population
    Load,
    /// The measured operation mix
    Run,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Load, Stage::Run];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Run => "run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(Stage::Load),
            "run" => Ok(Stage::Run),
            _ => Err(ConfigError::InvalidValue {
                field: "stage".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A metric recognised in the benchmark output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKind {
    Runtime,
    Operations,
    Throughput,
    /// Resident memory, keyed by the label token that named it (e.g. `maxrss`)
    ResidentMemory(String),
}

impl MetricKind {
    pub const RUNTIME: &'static str = "runtime";
    pub const OPERATIONS: &'static str = "operations";
    pub const THROUGHPUT: &'static str = "throughput";

    /// Slots every record carries, null until the output reports them
    pub const EXPECTED: [&'static str; 3] = [Self::RUNTIME, Self::OPERATIONS, Self::THROUGHPUT];

    pub fn name(&self) -> &str {
        match self {
            MetricKind::Runtime => Self::RUNTIME,
            MetricKind::Operations => Self::OPERATIONS,
            MetricKind::Throughput => Self::THROUGHPUT,
            MetricKind::ResidentMemory(name) => name,
        }
    }
}

/// Metric name to value for one stage; `None` marks a metric the trial never reported
pub type StageMetrics = BTreeMap<String, Option<f64>>;

/// Everything one trial reported, split by stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(default)]
    pub load: StageMetrics,
    #[serde(default)]
    pub run: StageMetrics,
}

impl MeasurementRecord {
    /// A record with an explicit null for each expected stage and metric
    pub fn with_placeholders() -> Self {
        let slots: StageMetrics = MetricKind::EXPECTED
            .iter()
            .map(|name| (name.to_string(), None))
            .collect();

        Self {
            load: slots.clone(),
            run: slots,
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageMetrics {
        match stage {
            Stage::Load => &self.load,
            Stage::Run => &self.run,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageMetrics {
        match stage {
            Stage::Load => &mut self.load,
            Stage::Run => &mut self.run,
        }
    }

    pub fn set(&mut self, stage: Stage, metric: &MetricKind, value: f64) {
        self.stage_mut(stage)
            .insert(metric.name().to_string(), Some(value));
    }

    pub fn get(&self, stage: Stage, metric: &str) -> Option<f64> {
        self.stage(stage).get(metric).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_serialize_as_null() {
        let record = MeasurementRecord::with_placeholders();
        let json = serde_json::to_value(&record).unwrap();

        for stage in ["load", "run"] {
            for metric in MetricKind::EXPECTED {
                assert!(json[stage][metric].is_null());
            }
        }
    }

    #[test]
    fn test_partial_record_deserializes() {
        let record: MeasurementRecord =
            serde_json::from_str(r#"{"load": {"runtime": 1.5}}"#).unwrap();

        assert_eq!(record.get(Stage::Load, "runtime"), Some(1.5));
        assert!(record.run.is_empty());
        assert_eq!(record.get(Stage::Run, "runtime"), None);
    }

    #[test]
    fn test_set_overrides_placeholder() {
        let mut record = MeasurementRecord::with_placeholders();
        record.set(Stage::Run, &MetricKind::Throughput, 12_500.0);
        record.set(Stage::Load, &MetricKind::ResidentMemory("maxrss".to_string()), 2048.0);

        assert_eq!(record.get(Stage::Run, "throughput"), Some(12_500.0));
        assert_eq!(record.get(Stage::Load, "maxrss"), Some(2048.0));
        assert_eq!(record.get(Stage::Load, "throughput"), None);
    }
}
