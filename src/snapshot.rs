//! Snapshot store
//!
//! Owns the append-only list of snapshot records for a run. Indices are handed out
//! as `0, 1, 2, …` in call order and never reused. With the pickle backend the
//! artifact for index `i` is always `<prefix><i>`; with the checkpoint backend the
//! key is `i` itself.

use crate::cleanup::remove_prefixed;
use crate::error::HarnessError;
use crate::oracle::SignatureOracle;
use crate::supervisor::ProcessSupervisor;
use crate::types::SnapshotRecord;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// How saved states are persisted by the external tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotBackend {
    /// Serialized to an artifact file `<prefix><index>` in the artifact directory.
    #[default]
    Pickle,
    /// Kept inside the service under the numeric key `<index>`; nothing on disk.
    Checkpoint,
}

/// Save and load executables, both invoked as `<tool> <mountPath> <artifact>`.
#[derive(Debug, Clone)]
pub struct SnapshotTools {
    pub save: PathBuf,
    pub load: PathBuf,
}

#[derive(Debug)]
pub struct SnapshotStore {
    backend: SnapshotBackend,
    tools: SnapshotTools,
    prefix: String,
    artifact_dir: PathBuf,
    records: Vec<SnapshotRecord>,
}

impl SnapshotStore {
    /// Create an empty store. The artifact directory is created if missing.
    pub fn new(
        backend: SnapshotBackend,
        tools: SnapshotTools,
        prefix: impl Into<String>,
        artifact_dir: PathBuf,
    ) -> Result<Self, HarnessError> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.contains('/') {
            return Err(HarnessError::Config(format!(
                "Snapshot prefix must be a non-empty file name prefix, got {:?}",
                prefix
            )));
        }
        std::fs::create_dir_all(&artifact_dir)?;
        Ok(Self {
            backend,
            tools,
            prefix,
            artifact_dir,
            records: Vec::new(),
        })
    }

    pub fn backend(&self) -> SnapshotBackend {
        self.backend
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Name the external tool persists snapshot `index` under.
    pub fn artifact_name(&self, index: usize) -> String {
        match self.backend {
            SnapshotBackend::Pickle => format!("{}{}", self.prefix, index),
            SnapshotBackend::Checkpoint => index.to_string(),
        }
    }

    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&SnapshotRecord> {
        self.records.get(index)
    }

    pub fn latest(&self) -> Option<&SnapshotRecord> {
        self.records.last()
    }

    /// Capture the current signature, persist the state under the next index, and
    /// record both.
    pub fn save(
        &mut self,
        supervisor: &ProcessSupervisor,
        oracle: &SignatureOracle,
        mount_path: &Path,
    ) -> Result<SnapshotRecord, HarnessError> {
        let signature = oracle.capture(supervisor, mount_path)?;
        let index = self.records.len();
        let artifact = self.artifact_name(index);

        let status = supervisor.spawn_blocking(
            &[
                self.tools.save.as_os_str(),
                mount_path.as_os_str(),
                OsStr::new(&artifact),
            ],
            &self.artifact_dir,
        )?;
        if !status.success() {
            error!(index, artifact = %artifact, "Save tool failed; restore of this index will not verify");
        }

        let record = SnapshotRecord {
            index,
            signature,
            artifact,
        };
        info!(
            index = record.index,
            artifact = %record.artifact,
            signature = %record.signature,
            "Snapshot saved"
        );
        self.records.push(record.clone());
        Ok(record)
    }

    /// Ask the load tool to bring back snapshot `index`. Does not verify.
    pub fn restore(
        &self,
        supervisor: &ProcessSupervisor,
        mount_path: &Path,
        index: usize,
    ) -> Result<&SnapshotRecord, HarnessError> {
        let record = self
            .records
            .get(index)
            .ok_or(HarnessError::UnknownSnapshot(index))?;
        let status = supervisor.spawn_blocking(
            &[
                self.tools.load.as_os_str(),
                mount_path.as_os_str(),
                OsStr::new(&record.artifact),
            ],
            &self.artifact_dir,
        )?;
        if !status.success() {
            error!(index, artifact = %record.artifact, "Load tool failed");
        }
        info!(index, artifact = %record.artifact, "Snapshot restored");
        Ok(record)
    }

    /// Remove every artifact carrying the run prefix. Idempotent; a no-op for the
    /// checkpoint backend and when nothing was saved.
    pub fn cleanup_artifacts(&self) -> Result<usize, HarnessError> {
        match self.backend {
            SnapshotBackend::Pickle => remove_prefixed(&self.prefix, Some(&self.artifact_dir)),
            SnapshotBackend::Checkpoint => Ok(0),
        }
    }
}
