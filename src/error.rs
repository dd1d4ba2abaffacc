//! Error types for the snapverify consistency harness.

use crate::types::Signature;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the harness can surface.
///
/// Only [`HarnessError::ChildProcessAbnormalExit`] is tolerated mid-run; workload
/// steps log it and continue. Everything else aborts the run and is routed through
/// the cleanup coordinator by the top-level handler.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Signature tool observed a transient filesystem state:\n{diagnostic}")]
    OracleTransient { diagnostic: String },

    #[error("Signature tool failed: {0}")]
    OracleFailed(String),

    #[error("Signature at index {index} has a discrepancy: {expected} -> {actual}")]
    VerificationMismatch {
        index: usize,
        expected: Signature,
        actual: Signature,
    },

    #[error("Refusing unsafe cleanup request: {0}")]
    UnsafeCleanupRequest(String),

    #[error("{program} exited abnormally ({status})")]
    ChildProcessAbnormalExit { program: String, status: String },

    #[error("Filesystem service for {} exited before unmount ({status})", .mount_path.display())]
    ServiceExited { mount_path: PathBuf, status: String },

    #[error("No snapshot recorded at index {0}")]
    UnknownSnapshot(usize),

    #[error("Invalid range for {name}: [{low}, {high})")]
    InvalidRange { name: String, low: u64, high: u64 },

    #[error("Interrupted by operator")]
    Interrupted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Whether this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HarnessError::ChildProcessAbnormalExit { .. })
    }
}

impl From<config::ConfigError> for HarnessError {
    fn from(err: config::ConfigError) -> Self {
        HarnessError::Config(err.to_string())
    }
}
