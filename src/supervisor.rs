//! Process supervisor
//!
//! Spawns, tracks, and terminates every child process of a run: the filesystem
//! service and the stress generator. No other component signals or waits on a
//! child directly; short-lived tools are run to completion through
//! [`ProcessSupervisor::spawn_blocking`] and [`ProcessSupervisor::run_captured`].

pub mod platform;

use crate::error::HarnessError;
use crate::interrupt::{CancelToken, POLL_INTERVAL};
use crate::types::{JobState, MountHandle, MountState, StressJobHandle};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub use platform::UnmountCommand;

/// How long a signaled stress job gets before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

enum ChildKind {
    Service,
    Stress(StressJobHandle),
}

struct TrackedChild {
    program: String,
    child: Child,
    kind: ChildKind,
}

/// Owner of all long-lived children of a run.
pub struct ProcessSupervisor {
    children: Mutex<HashMap<u32, TrackedChild>>,
    unmount: UnmountCommand,
    unmount_timeout: Duration,
    cancel: CancelToken,
}

impl ProcessSupervisor {
    /// `unmount_timeout` bounds how long [`Self::unmount`] waits before killing the
    /// service; zero waits until the service exits on its own.
    pub fn new(unmount: UnmountCommand, unmount_timeout: Duration, cancel: CancelToken) -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
            unmount,
            unmount_timeout,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Create the mount directory if needed and spawn `executable <mount_path>`.
    ///
    /// Returns immediately in `Starting` state; the service mounts asynchronously
    /// and gives no ready notification, so callers settle with [`Self::await_mounted`].
    pub fn mount(&self, executable: &Path, mount_path: &Path) -> Result<MountHandle, HarnessError> {
        std::fs::create_dir_all(mount_path)?;
        let mount_path = mount_path.canonicalize()?;

        let child = Command::new(executable)
            .arg(&mount_path)
            .stdin(Stdio::null())
            .stdout(child_stdout())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: executable.display().to_string(),
                source,
            })?;
        let pid = child.id();
        info!(
            pid,
            executable = %executable.display(),
            mount_path = %mount_path.display(),
            "Filesystem service spawned"
        );

        self.children.lock().insert(
            pid,
            TrackedChild {
                program: executable.display().to_string(),
                child,
                kind: ChildKind::Service,
            },
        );
        Ok(MountHandle::starting(pid, mount_path))
    }

    /// Wait out the mount settle delay, then confirm the service is still alive.
    pub fn await_mounted(
        &self,
        handle: &mut MountHandle,
        settle: Duration,
    ) -> Result<(), HarnessError> {
        self.cancel.sleep(settle)?;
        if let Some(status) = self.reap_if_exited(handle.pid)? {
            handle.state = MountState::Unmounted;
            handle.exit_code = status.code();
            return Err(HarnessError::ServiceExited {
                mount_path: handle.mount_path.clone(),
                status: status.to_string(),
            });
        }
        handle.state = MountState::Mounted;
        debug!(pid = handle.pid, "Filesystem service mounted");
        Ok(())
    }

    /// Unmount and wait for the service to exit. Returns the service's exit code.
    ///
    /// Safe to call repeatedly and after the service has already exited. A failing
    /// unmount command is logged only; the service's own exit status is what counts.
    /// A service still running after the unmount timeout is killed and reports no
    /// exit code.
    pub fn unmount(&self, handle: &mut MountHandle) -> Result<Option<i32>, HarnessError> {
        if handle.is_unmounted() {
            return Ok(handle.exit_code);
        }
        handle.state = MountState::Unmounting;
        info!(mount_path = %handle.mount_path.display(), "Unmounting");

        let args = self.unmount.args_for(&handle.mount_path);
        match Command::new(&self.unmount.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => {
                debug!(program = %self.unmount.program, "Unmount command succeeded");
            }
            Ok(output) => {
                warn!(
                    program = %self.unmount.program,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Unmount command exited non-zero"
                );
            }
            Err(e) => {
                warn!(
                    program = %self.unmount.program,
                    error = %e,
                    "Unmount command could not be run; signaling service instead"
                );
                let _ = kill(Pid::from_raw(handle.pid as i32), Signal::SIGTERM);
            }
        }

        let limit = (!self.unmount_timeout.is_zero()).then_some(self.unmount_timeout);
        let status = self.wait_with_timeout(handle.pid, limit)?;
        handle.state = MountState::Unmounted;
        handle.exit_code = status.and_then(|s| s.code());
        info!(
            pid = handle.pid,
            exit_code = ?handle.exit_code,
            "Filesystem service exited"
        );
        Ok(handle.exit_code)
    }

    /// Launch the stress generator in its own process group; the job stays owned by
    /// the supervisor until it exits.
    pub fn launch_job<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        duration: Duration,
        threads: u32,
    ) -> Result<StressJobHandle, HarnessError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(child_stdout())
            .process_group(0)
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: program.display().to_string(),
                source,
            })?;
        let handle = StressJobHandle {
            pid: child.id(),
            duration,
            threads,
            state: JobState::Running,
        };
        info!(
            pid = handle.pid,
            duration_secs = duration.as_secs(),
            threads,
            "Stress job launched"
        );
        self.children.lock().insert(
            handle.pid,
            TrackedChild {
                program: program.display().to_string(),
                child,
                kind: ChildKind::Stress(handle.clone()),
            },
        );
        Ok(handle)
    }

    /// Block until the stress job exits. An interrupt leaves the job running and
    /// tracked so cleanup can terminate it.
    pub fn wait_job(&self, job: &mut StressJobHandle) -> Result<(), HarnessError> {
        loop {
            self.cancel.check()?;
            match self.reap_if_exited(job.pid)? {
                Some(status) => {
                    job.state = JobState::Exited(status.code());
                    if !status.success() {
                        let err = HarnessError::ChildProcessAbnormalExit {
                            program: "stress job".to_string(),
                            status: status.to_string(),
                        };
                        warn!(pid = job.pid, "{}", err);
                    } else {
                        info!(pid = job.pid, "Stress job finished");
                    }
                    return Ok(());
                }
                None if !self.is_tracked(job.pid) => {
                    job.state = JobState::Terminated;
                    return Ok(());
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }

    /// Best-effort interruption of a stress job and every worker it forked. Never
    /// fails: a job that already exited is not an error.
    ///
    /// `signal` goes to the whole process group first; whatever is still alive
    /// after the grace period (workers that ignore it included) is killed.
    pub fn terminate(&self, job: &mut StressJobHandle, signal: Signal) {
        signal_group(job.pid, signal);
        match self.wait_with_timeout(job.pid, Some(TERMINATE_GRACE)) {
            Ok(_) => {}
            Err(e) => debug!(pid = job.pid, error = %e, "Reaping terminated job failed"),
        }
        signal_group(job.pid, Signal::SIGKILL);
        job.state = JobState::Terminated;
    }

    /// Terminate every stress job still tracked. Returns how many were signaled.
    pub fn terminate_live_jobs(&self, signal: Signal) -> usize {
        let mut jobs: Vec<StressJobHandle> = self
            .children
            .lock()
            .values()
            .filter_map(|tracked| match &tracked.kind {
                ChildKind::Stress(handle) => Some(handle.clone()),
                ChildKind::Service => None,
            })
            .collect();
        for job in &mut jobs {
            warn!(pid = job.pid, "Terminating live stress job");
            self.terminate(job, signal);
        }
        jobs.len()
    }

    /// Run a short-lived command to completion in `cwd`.
    ///
    /// A non-zero exit is logged and returned, never raised: individual filesystem
    /// operations are allowed to fail during workloads. Failing to spawn is fatal.
    pub fn spawn_blocking<S: AsRef<OsStr>>(
        &self,
        argv: &[S],
        cwd: &Path,
    ) -> Result<ExitStatus, HarnessError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HarnessError::Config("Empty command line".to_string()))?;
        let program_name = program.as_ref().to_string_lossy().to_string();
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| HarnessError::Spawn {
                program: program_name.clone(),
                source,
            })?;
        if !output.status.success() {
            let err = HarnessError::ChildProcessAbnormalExit {
                program: program_name,
                status: output.status.to_string(),
            };
            warn!(
                cwd = %cwd.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "{}", err
            );
        }
        Ok(output.status)
    }

    /// Run a command to completion and hand back its captured output.
    pub fn run_captured<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        cwd: Option<&Path>,
    ) -> Result<Output, HarnessError> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        command.output().map_err(|source| HarnessError::Spawn {
            program: program.display().to_string(),
            source,
        })
    }

    fn is_tracked(&self, pid: u32) -> bool {
        self.children.lock().contains_key(&pid)
    }

    /// Non-blocking reap. `Ok(None)` means still running or not tracked.
    fn reap_if_exited(&self, pid: u32) -> Result<Option<ExitStatus>, HarnessError> {
        let mut children = self.children.lock();
        let status = match children.get_mut(&pid) {
            Some(tracked) => tracked.child.try_wait()?,
            None => return Ok(None),
        };
        if status.is_some() {
            if let Some(tracked) = children.remove(&pid) {
                debug!(pid, program = %tracked.program, "Child reaped");
            }
        }
        Ok(status)
    }

    /// Wait for a tracked child, killing it once `timeout` passes. `None` waits
    /// for as long as the child runs.
    fn wait_with_timeout(
        &self,
        pid: u32,
        timeout: Option<Duration>,
    ) -> Result<Option<ExitStatus>, HarnessError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(status) = self.reap_if_exited(pid)? {
                return Ok(Some(status));
            }
            if !self.is_tracked(pid) {
                return Ok(None);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                error!(pid, "Child did not exit in time; killing");
                let mut children = self.children.lock();
                if let Some(mut tracked) = children.remove(&pid) {
                    let _ = tracked.child.kill();
                    return Ok(Some(tracked.child.wait()?));
                }
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Where children's stdout goes. Reports own the harness's stdout.
fn child_stdout() -> Stdio {
    Stdio::from(std::io::stderr())
}

/// Signal the process group led by `pgid`. A group with no members left is not an error.
fn signal_group(pgid: u32, signal: Signal) {
    match kill(Pid::from_raw(-(pgid as i32)), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pgid, %signal, error = %e, "Signal not delivered to job group"),
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        for (pid, mut tracked) in self.children.get_mut().drain() {
            warn!(pid, program = %tracked.program, "Killing child left behind at shutdown");
            if let ChildKind::Stress(_) = tracked.kind {
                signal_group(pid, Signal::SIGKILL);
            }
            let _ = tracked.child.kill();
            let _ = tracked.child.wait();
        }
    }
}
