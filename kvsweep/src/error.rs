//! Error handling for the kvsweep pipeline
//!
//! Each pipeline stage has its own error type. Trial and process failures are
//! fatal to the stage that hit them, persistence failures distinguish a missing
//! document from a corrupt one, and configuration errors carry the offending
//! chart task or field so the operator can fix the input.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The main error type for the pipeline
#[derive(Error, Debug)]
pub enum HarnessError {
    /// External benchmark process errors
    #[error("Process failure: {0}")]
    Process(#[from] ProcessError),

    /// Store document errors
    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration and chart task errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Chart drawing errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Errors raised while running the external benchmark
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("trial {trial} exited with {status}: {stderr}")]
    NonZeroExit {
        trial: String,
        status: String,
        stderr: String,
    },

    #[error("trial {trial} timed out after {after:?}")]
    Timeout { trial: String, after: Duration },

    #[error("unparsable output line {line:?}: {reason}")]
    Unparsable { line: String, reason: String },
}

impl ProcessError {
    /// Timeouts and non-zero exits may succeed on another attempt; spawn and
    /// parse failures will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessError::NonZeroExit { .. } | ProcessError::Timeout { .. }
        )
    }
}

/// Errors reading or writing the raw and filtered store documents
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt store document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot serialize store document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown workload {workload:?}")]
    UnknownWorkload { workload: String },

    #[error("chart {task}: no data at {path}")]
    MissingData { task: String, path: String },

    #[error("chart {task}: store {store} has thread counts {found:?}, expected {expected:?}")]
    ThreadDomainMismatch {
        task: String,
        store: String,
        expected: Vec<u32>,
        found: Vec<u32>,
    },

    #[error("chart {task} lists no stores")]
    EmptyTask { task: String },

    #[error("invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("configuration parsing error: {reason}")]
    ParseError { reason: String },

    #[error("configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("permission denied writing configuration: {path}")]
    PermissionDenied { path: String },
}

/// Chart drawing errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot create chart directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("drawing {task} failed: {reason}")]
    Drawing { task: String, reason: String },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for store operations
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HarnessError::Config(ConfigError::UnknownWorkload {
            workload: "z".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Configuration error: unknown workload \"z\""
        );

        let error = ProcessError::Timeout {
            trial: "rwl_db/a/4/uniform".to_string(),
            after: Duration::from_secs(5),
        };
        assert_eq!(error.to_string(), "trial rwl_db/a/4/uniform timed out after 5s");
    }

    #[test]
    fn test_retryable_classification() {
        let timeout = ProcessError::Timeout {
            trial: "t".to_string(),
            after: Duration::from_millis(1),
        };
        assert!(timeout.is_retryable());

        let unparsable = ProcessError::Unparsable {
            line: "Run throughput(ops/sec): fast".to_string(),
            reason: "invalid float literal".to_string(),
        };
        assert!(!unparsable.is_retryable());
    }
}
