//! Configuration System
//!
//! Layered harness configuration: merge-policy defaults, the global file, the
//! workspace files, then `SNAPVERIFY__*` environment variables. Relative paths are
//! resolved against the workspace root once loading is done.

use crate::logging::LoggingConfig;
use crate::quiesce::QuiescenceMode;
use crate::snapshot::{SnapshotBackend, SnapshotTools};
use crate::stress::StressPlan;
use crate::supervisor::UnmountCommand;
use crate::verifier::scenario::ScenarioCounts;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub stress: StressConfig,
    #[serde(default)]
    pub quiescence: QuiescenceConfig,
    /// Replaces the per-platform unmount command when set.
    #[serde(default)]
    pub unmount: Option<UnmountCommand>,
    #[serde(default)]
    pub scenario: ScenarioCounts,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The filesystem service under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    #[serde(default = "default_mount_path")]
    pub mount_path: PathBuf,
}

fn default_executable() -> PathBuf {
    PathBuf::from("fuse-cpp-ramfs")
}

fn default_mount_path() -> PathBuf {
    PathBuf::from("mnt/fuse-cpp-ramfs")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            mount_path: default_mount_path(),
        }
    }
}

/// External tool executables. Bare names are looked up on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_signature_tool")]
    pub signature: PathBuf,
    #[serde(default = "default_save_tool")]
    pub save: PathBuf,
    #[serde(default = "default_load_tool")]
    pub load: PathBuf,
    #[serde(default = "default_checkpoint_tool")]
    pub checkpoint: PathBuf,
    #[serde(default = "default_restore_tool")]
    pub restore: PathBuf,
    /// Racer script; required by `stress` only.
    #[serde(default)]
    pub stress: Option<PathBuf>,
}

fn default_signature_tool() -> PathBuf {
    PathBuf::from("absfs")
}

fn default_save_tool() -> PathBuf {
    PathBuf::from("pkl")
}

fn default_load_tool() -> PathBuf {
    PathBuf::from("load")
}

fn default_checkpoint_tool() -> PathBuf {
    PathBuf::from("ckpt")
}

fn default_restore_tool() -> PathBuf {
    PathBuf::from("restore")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            signature: default_signature_tool(),
            save: default_save_tool(),
            load: default_load_tool(),
            checkpoint: default_checkpoint_tool(),
            restore: default_restore_tool(),
            stress: None,
        }
    }
}

impl ToolsConfig {
    /// Save/load pair for the selected backend.
    pub fn snapshot_tools(&self, backend: SnapshotBackend) -> SnapshotTools {
        match backend {
            SnapshotBackend::Pickle => SnapshotTools {
                save: self.save.clone(),
                load: self.load.clone(),
            },
            SnapshotBackend::Checkpoint => SnapshotTools {
                save: self.checkpoint.clone(),
                load: self.restore.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default)]
    pub backend: SnapshotBackend,
}

fn default_prefix() -> String {
    "pickle_tmp".to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            artifact_dir: default_artifact_dir(),
            backend: SnapshotBackend::default(),
        }
    }
}

/// Settle delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_settle_ms")]
    pub mount_settle_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub restore_settle_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub stress_settle_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub cleanup_settle_ms: u64,
    /// How long unmount waits for the service to exit before killing it.
    /// `0` waits for as long as the service runs.
    #[serde(default = "default_unmount_timeout_ms")]
    pub unmount_timeout_ms: u64,
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_unmount_timeout_ms() -> u64 {
    10_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mount_settle_ms: default_settle_ms(),
            restore_settle_ms: default_settle_ms(),
            stress_settle_ms: default_settle_ms(),
            cleanup_settle_ms: default_settle_ms(),
            unmount_timeout_ms: default_unmount_timeout_ms(),
        }
    }
}

impl TimingConfig {
    pub fn mount_settle(&self) -> Duration {
        Duration::from_millis(self.mount_settle_ms)
    }

    pub fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }

    pub fn stress_settle(&self) -> Duration {
        Duration::from_millis(self.stress_settle_ms)
    }

    pub fn cleanup_settle(&self) -> Duration {
        Duration::from_millis(self.cleanup_settle_ms)
    }

    pub fn unmount_timeout(&self) -> Duration {
        Duration::from_millis(self.unmount_timeout_ms)
    }
}

/// Half-open integer interval `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub low: u32,
    pub high: u32,
}

impl IntRange {
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    pub fn as_range(&self) -> Range<u32> {
        self.low..self.high
    }

    fn check(&self, name: &str) -> Result<(), ValidationError> {
        if self.low >= self.high {
            return Err(ValidationError::Field(
                name.to_string(),
                format!("empty range [{}, {})", self.low, self.high),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressConfig {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: IntRange,
    #[serde(default = "default_threads")]
    pub threads: IntRange,
    #[serde(default = "default_rounds")]
    pub rounds: IntRange,
    /// Fixed RNG seed for reproducible draws.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_duration_secs() -> IntRange {
    IntRange::new(5, 15)
}

fn default_threads() -> IntRange {
    IntRange::new(2, 8)
}

fn default_rounds() -> IntRange {
    IntRange::new(1, 4)
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            threads: default_threads(),
            rounds: default_rounds(),
            seed: None,
        }
    }
}

impl StressConfig {
    pub fn plan(&self) -> StressPlan {
        StressPlan {
            duration_secs: self.duration_secs.as_range(),
            threads: self.threads.as_range(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuiescenceConfig {
    #[serde(default)]
    pub mode: QuiescenceMode,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Field(String, String),
    Backend(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Field(key, msg) => write!(f, "{}: {}", key, msg),
            ValidationError::Backend(msg) => write!(f, "snapshot.backend: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn non_empty(key: &str, path: &Path, errors: &mut Vec<ValidationError>) {
    if path.as_os_str().is_empty() {
        errors.push(ValidationError::Field(
            key.to_string(),
            "cannot be empty".to_string(),
        ));
    }
}

impl HarnessConfig {
    /// Validate the entire configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        non_empty("service.executable", &self.service.executable, &mut errors);
        non_empty("service.mount_path", &self.service.mount_path, &mut errors);
        non_empty("tools.signature", &self.tools.signature, &mut errors);
        match self.snapshot.backend {
            SnapshotBackend::Pickle => {
                non_empty("tools.save", &self.tools.save, &mut errors);
                non_empty("tools.load", &self.tools.load, &mut errors);
            }
            SnapshotBackend::Checkpoint => {
                non_empty("tools.checkpoint", &self.tools.checkpoint, &mut errors);
                non_empty("tools.restore", &self.tools.restore, &mut errors);
            }
        }

        if self.snapshot.prefix.is_empty() {
            errors.push(ValidationError::Field(
                "snapshot.prefix".to_string(),
                "cannot be empty".to_string(),
            ));
        } else if self.snapshot.prefix.contains('/') {
            errors.push(ValidationError::Field(
                "snapshot.prefix".to_string(),
                "must be a file name prefix without '/'".to_string(),
            ));
        }
        if self.snapshot.backend == SnapshotBackend::Pickle
            && self.snapshot.artifact_dir.as_os_str() == "/"
        {
            errors.push(ValidationError::Backend(
                "pickle artifacts cannot live in the filesystem root".to_string(),
            ));
        }

        for (name, range) in [
            ("stress.duration_secs", &self.stress.duration_secs),
            ("stress.threads", &self.stress.threads),
            ("stress.rounds", &self.stress.rounds),
        ] {
            if let Err(e) = range.check(name) {
                errors.push(e);
            }
        }

        if let Some(unmount) = &self.unmount {
            if unmount.program.is_empty() {
                errors.push(ValidationError::Field(
                    "unmount.program".to_string(),
                    "cannot be empty".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve relative paths against `workspace_root`.
    ///
    /// Mount and artifact paths are always workspace-relative. Tool paths are only
    /// when they name a path (`../build/pkl`); a bare name (`absfs`) stays a `PATH`
    /// lookup.
    pub fn resolve_paths(&mut self, workspace_root: &Path) {
        self.service.mount_path = workspace_path(workspace_root, &self.service.mount_path);
        self.snapshot.artifact_dir = workspace_path(workspace_root, &self.snapshot.artifact_dir);
        self.service.executable = tool_path(workspace_root, &self.service.executable);
        for tool in [
            &mut self.tools.signature,
            &mut self.tools.save,
            &mut self.tools.load,
            &mut self.tools.checkpoint,
            &mut self.tools.restore,
        ] {
            *tool = tool_path(workspace_root, tool);
        }
        if let Some(stress) = self.tools.stress.as_mut() {
            *stress = tool_path(workspace_root, stress);
        }
    }
}

fn workspace_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

fn tool_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.components().count() <= 1 {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}
