//! Trial descriptors and the external benchmark invocation they produce

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Key access pattern used by the benchmark while selecting records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Uniform,
    Zipfian,
    Latest,
}

impl Distribution {
    /// The distributions swept when the configuration does not name any
    pub const DEFAULT_SWEEP: [Distribution; 2] = [Distribution::Uniform, Distribution::Zipfian];

    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Uniform => "uniform",
            Distribution::Zipfian => "zipfian",
            Distribution::Latest => "latest",
        }
    }

    /// The benchmark tool already defaults to uniform, so it gets no override
    pub fn is_tool_default(&self) -> bool {
        matches!(self, Distribution::Uniform)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(Distribution::Uniform),
            "zipfian" => Ok(Distribution::Zipfian),
            "latest" => Ok(Distribution::Latest),
            _ => Err(ConfigError::InvalidValue {
                field: "distribution".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Location of the benchmark executable and its workload files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkBinary {
    pub program: PathBuf,
    pub workload_dir: PathBuf,
}

impl Default for BenchmarkBinary {
    fn default() -> Self {
        Self {
            program: PathBuf::from("../build/ycsb"),
            workload_dir: PathBuf::from("../workloads"),
        }
    }
}

impl BenchmarkBinary {
    pub fn workload_file(&self, workload: &str) -> PathBuf {
        self.workload_dir.join(format!("workload{}", workload))
    }
}

/// A fully resolved command line for one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One measurement point of a sweep
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrialDescriptor {
    store: String,
    workload: String,
    threads: u32,
    distribution: Distribution,
}

impl TrialDescriptor {
    pub fn new(
        store: impl Into<String>,
        workload: impl Into<String>,
        threads: u32,
        distribution: Distribution,
    ) -> Self {
        Self {
            store: store.into(),
            workload: workload.into(),
            threads,
            distribution,
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn workload(&self) -> &str {
        &self.workload
    }

    pub fn threads(&self) -> u32 {
        self.threads
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Build the argv for this trial. The request distribution override is
    /// only emitted when it differs from the tool's own default.
    pub fn invocation(&self, binary: &BenchmarkBinary) -> Invocation {
        let mut args = vec![
            "-db".to_string(),
            self.store.clone(),
            "-threads".to_string(),
            self.threads.to_string(),
            "-load".to_string(),
            "-run".to_string(),
            "-P".to_string(),
            path_arg(&binary.workload_file(&self.workload)),
        ];

        if !self.distribution.is_tool_default() {
            args.push("-p".to_string());
            args.push(format!("requestdistribution={}", self.distribution));
        }

        Invocation {
            program: binary.program.clone(),
            args,
        }
    }
}

impl fmt::Display for TrialDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.store, self.workload, self.threads, self.distribution
        )
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
