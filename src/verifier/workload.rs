//! Workloads: ordered filesystem operations applied through the mount.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One operation of a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadStep {
    /// Run `argv` with the working directory `cwd`, relative to the mount root.
    Command { argv: Vec<OsString>, cwd: PathBuf },
    /// One Stress Injector run followed by a quiescence wait.
    Stress,
    /// Remove every entry under the mount root.
    ClearMount,
}

/// An ordered list of steps, built fluently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    steps: Vec<WorkloadStep>,
}

impl Workload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[WorkloadStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Any command, run in `cwd` below the mount root.
    pub fn command<I, S>(mut self, cwd: impl AsRef<Path>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.steps.push(WorkloadStep::Command {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: cwd.as_ref().to_path_buf(),
        });
        self
    }

    pub fn mkdir(self, cwd: impl AsRef<Path>, name: &str) -> Self {
        self.command(cwd, ["mkdir", name])
    }

    pub fn touch(self, cwd: impl AsRef<Path>, name: &str) -> Self {
        self.command(cwd, ["touch", name])
    }

    pub fn chmod(self, cwd: impl AsRef<Path>, mode: &str, name: &str) -> Self {
        self.command(cwd, ["chmod", mode, name])
    }

    pub fn rename(self, cwd: impl AsRef<Path>, from: &str, to: &str) -> Self {
        self.command(cwd, ["mv", from, to])
    }

    pub fn remove(self, cwd: impl AsRef<Path>, name: &str) -> Self {
        self.command(cwd, ["rm", "-rf", name])
    }

    pub fn stress(mut self) -> Self {
        self.steps.push(WorkloadStep::Stress);
        self
    }

    pub fn clear_mount(mut self) -> Self {
        self.steps.push(WorkloadStep::ClearMount);
        self
    }

    /// Append every step of `other`.
    pub fn then(mut self, other: Workload) -> Self {
        self.steps.extend(other.steps);
        self
    }
}
