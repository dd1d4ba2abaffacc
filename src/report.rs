//! Run reports for the CLI: what was saved, what was verified, how cleanup went.

use crate::cleanup::CleanupReport;
use crate::snapshot::SnapshotBackend;
use crate::types::{SnapshotRecord, VerificationOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Exit code for any failed run.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Outcome of a `verify` or `stress` run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mount_path: PathBuf,
    pub backend: SnapshotBackend,
    pub records: Vec<SnapshotRecord>,
    pub outcomes: Vec<VerificationOutcome>,
    /// Absent when the run failed before anything needed tearing down.
    pub cleanup: Option<CleanupReport>,
    pub error: Option<String>,
    pub exit_code: i32,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of `mount-check`.
#[derive(Debug, Clone, Serialize)]
pub struct MountCheckReport {
    pub executable: PathBuf,
    pub mount_path: PathBuf,
    pub cleanup: CleanupReport,
    pub error: Option<String>,
    pub exit_code: i32,
}

/// Outcome of `usage-check`.
#[derive(Debug, Clone, Serialize)]
pub struct UsageCheckReport {
    pub executable: PathBuf,
    pub expected_stderr: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub violations: Vec<String>,
}

impl UsageCheckReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Map a run result to the process exit code.
///
/// Success exits with the service's own code; a service killed by a signal has
/// none and counts as failure.
pub fn exit_code_for(succeeded: bool, service_exit_code: Option<i32>) -> i32 {
    match (succeeded, service_exit_code) {
        (true, Some(code)) => code,
        _ => FAILURE_EXIT_CODE,
    }
}
