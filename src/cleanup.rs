//! Cleanup coordinator and guarded prefix deletion.
//!
//! The coordinator runs on every exit path of a run and never fails: each step is
//! guarded on its own so a failure in one does not skip the next. Order is fixed:
//! terminate live stress jobs, settle, unmount, remove snapshot artifacts.

use crate::error::HarnessError;
use crate::snapshot::SnapshotStore;
use crate::supervisor::ProcessSupervisor;
use crate::types::MountHandle;
use nix::sys::signal::Signal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Delete every entry in a directory whose name starts with a prefix.
///
/// `prefix` may carry a directory part (`"out/pickle_tmp"`), resolved against `cwd`
/// or the process working directory. Refuses, before touching anything, an empty
/// prefix without an explicit `cwd`, the prefix `/`, and any request whose
/// directory resolves to the filesystem root. A missing directory removes nothing.
pub fn remove_prefixed(prefix: &str, cwd: Option<&Path>) -> Result<usize, HarnessError> {
    if prefix == "/" {
        return Err(HarnessError::UnsafeCleanupRequest(
            "prefix is the filesystem root".to_string(),
        ));
    }
    if prefix.is_empty() && cwd.is_none() {
        return Err(HarnessError::UnsafeCleanupRequest(
            "empty prefix without an explicit working directory".to_string(),
        ));
    }

    let base = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let (dir, name_prefix) = split_prefix(&base, prefix);
    if is_root(&dir) {
        return Err(HarnessError::UnsafeCleanupRequest(format!(
            "would delete {:?}* in the filesystem root ({})",
            name_prefix,
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    let mut first_error = None;
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_name().to_string_lossy().starts_with(name_prefix) {
            continue;
        }
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir_all(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(HarnessError::Io(e)),
        None => Ok(removed),
    }
}

fn split_prefix<'p>(base: &Path, prefix: &'p str) -> (PathBuf, &'p str) {
    match prefix.rsplit_once('/') {
        Some(("", name)) => (PathBuf::from("/"), name),
        Some((dir, name)) => (base.join(dir), name),
        None => (base.to_path_buf(), prefix),
    }
}

fn is_root(dir: &Path) -> bool {
    let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    resolved.parent().is_none()
}

/// What the coordinator did; failures are recorded, never raised.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub jobs_terminated: usize,
    pub service_exit_code: Option<i32>,
    pub artifacts_removed: usize,
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tears a run down on success, failure and interrupt alike.
pub struct CleanupCoordinator<'a> {
    supervisor: &'a ProcessSupervisor,
    settle: Duration,
}

impl<'a> CleanupCoordinator<'a> {
    pub fn new(supervisor: &'a ProcessSupervisor, settle: Duration) -> Self {
        Self { supervisor, settle }
    }

    pub fn run(
        &self,
        mount: Option<&mut MountHandle>,
        store: Option<&SnapshotStore>,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        info!("Performing cleanup");

        report.jobs_terminated = self.supervisor.terminate_live_jobs(Signal::SIGINT);
        if report.jobs_terminated > 0 {
            warn!(count = report.jobs_terminated, "Interrupted live stress jobs");
        }

        // Deliberately not cancel-aware: cleanup must finish after an interrupt.
        std::thread::sleep(self.settle);

        if let Some(handle) = mount {
            match self.supervisor.unmount(handle) {
                Ok(code) => report.service_exit_code = code,
                Err(e) => {
                    error!(error = %e, "Unmount failed during cleanup");
                    report.failures.push(format!("unmount: {}", e));
                }
            }
        }

        if let Some(store) = store {
            match store.cleanup_artifacts() {
                Ok(count) => report.artifacts_removed = count,
                Err(e) => {
                    error!(error = %e, "Artifact cleanup failed");
                    report.failures.push(format!("artifacts: {}", e));
                }
            }
        }

        info!(
            jobs_terminated = report.jobs_terminated,
            exit_code = ?report.service_exit_code,
            artifacts_removed = report.artifacts_removed,
            failures = report.failures.len(),
            "Cleanup finished"
        );
        report
    }
}
