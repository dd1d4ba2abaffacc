//! Core data model: mount handles, signatures, snapshot records, stress jobs and
//! verification outcomes.

use crate::error::HarnessError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Liveness of a filesystem-service process as tracked by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MountState {
    Starting,
    Mounted,
    Unmounting,
    Unmounted,
}

/// A running filesystem service and the path it is attached to.
///
/// Only the supervisor mutates a handle; everyone else reads `mount_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountHandle {
    pub pid: u32,
    pub mount_path: PathBuf,
    pub state: MountState,
    /// Exit code of the service, known once the handle is `Unmounted`.
    pub exit_code: Option<i32>,
}

impl MountHandle {
    pub(crate) fn starting(pid: u32, mount_path: PathBuf) -> Self {
        Self {
            pid,
            mount_path,
            state: MountState::Starting,
            exit_code: None,
        }
    }

    pub fn is_unmounted(&self) -> bool {
        self.state == MountState::Unmounted
    }
}

/// Opaque content fingerprint reported by the signature tool.
///
/// Equality is byte equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Signature {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A saved state: its position in the run, the signature captured just before
/// saving, and the name the external tool persisted it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub index: usize,
    pub signature: Signature,
    pub artifact: String,
}

/// Lifecycle of a stress-generator process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Exited(Option<i32>),
    Terminated,
}

/// A stress-generator process and the parameters it was launched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressJobHandle {
    pub pid: u32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub threads: u32,
    pub state: JobState,
}

impl StressJobHandle {
    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_secs())
    }
}

/// Result of one verification cycle. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    Pass {
        index: usize,
        signature: Signature,
    },
    Mismatch {
        index: usize,
        expected: Signature,
        actual: Signature,
    },
    OracleTransient {
        diagnostic: String,
    },
    ProcessFailure {
        message: String,
    },
}

impl VerificationOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, VerificationOutcome::Pass { .. })
    }

    /// Classify a run-aborting error for the report.
    pub fn from_error(err: &HarnessError) -> Self {
        match err {
            HarnessError::VerificationMismatch {
                index,
                expected,
                actual,
            } => VerificationOutcome::Mismatch {
                index: *index,
                expected: expected.clone(),
                actual: actual.clone(),
            },
            HarnessError::OracleTransient { diagnostic } => VerificationOutcome::OracleTransient {
                diagnostic: diagnostic.clone(),
            },
            other => VerificationOutcome::ProcessFailure {
                message: other.to_string(),
            },
        }
    }

    /// Turn a mismatch into the error the run raises; other outcomes pass through.
    pub fn into_result(self) -> Result<VerificationOutcome, HarnessError> {
        match self {
            VerificationOutcome::Mismatch {
                index,
                expected,
                actual,
            } => Err(HarnessError::VerificationMismatch {
                index,
                expected,
                actual,
            }),
            VerificationOutcome::OracleTransient { diagnostic } => {
                Err(HarnessError::OracleTransient { diagnostic })
            }
            other => Ok(other),
        }
    }
}
