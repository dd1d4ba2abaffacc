//! Harness: builds a run's components from configuration and owns its lifecycle.
//!
//! Every session follows the same shape: clear leftovers, mount, settle, run the
//! body, then hand the mount and the snapshot store to the cleanup coordinator no
//! matter how the body ended.

use crate::cleanup::{remove_prefixed, CleanupCoordinator};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::interrupt::CancelToken;
use crate::oracle::SignatureOracle;
use crate::quiesce;
use crate::report::{
    exit_code_for, MountCheckReport, RunReport, UsageCheckReport, FAILURE_EXIT_CODE,
};
use crate::snapshot::SnapshotStore;
use crate::stress::StressInjector;
use crate::supervisor::{ProcessSupervisor, UnmountCommand};
use crate::types::VerificationOutcome;
use crate::verifier::{scenario, ConsistencyVerifier};
use chrono::Utc;
use std::path::Path;
use tracing::{error, info, warn};

pub struct Harness {
    config: HarnessConfig,
    cancel: CancelToken,
}

impl Harness {
    /// `config` is expected to be validated with paths already resolved.
    pub fn new(config: HarnessConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The end-to-end and rename-before-restore scenario.
    pub fn verify(&self) -> RunReport {
        let counts = self.config.scenario;
        self.run_session("verify", |verifier| {
            scenario::run_end_to_end(verifier, counts).map(|_| ())
        })
    }

    /// Randomized stress rounds.
    pub fn stress(&self) -> RunReport {
        if self.config.tools.stress.is_none() {
            return self.failed_before_mount(
                "stress",
                HarnessError::Config("tools.stress is not configured".to_string()),
            );
        }
        let rounds = self.config.stress.rounds.as_range();
        self.run_session("stress", |verifier| {
            verifier.run_stress_rounds(rounds).map(|_| ())
        })
    }

    /// Mount, settle, unmount; exit with the service's code.
    pub fn mount_check(&self) -> Result<MountCheckReport, HarnessError> {
        let supervisor = self.supervisor();
        let mut handle = supervisor.mount(
            &self.config.service.executable,
            &self.config.service.mount_path,
        )?;
        let settled = supervisor.await_mounted(&mut handle, self.config.timing.mount_settle());
        if let Err(e) = &settled {
            error!(error = %e, "Mount check failed");
        }
        let cleanup = CleanupCoordinator::new(&supervisor, self.config.timing.cleanup_settle())
            .run(Some(&mut handle), None);
        let exit_code = exit_code_for(settled.is_ok(), cleanup.service_exit_code);
        Ok(MountCheckReport {
            executable: self.config.service.executable.clone(),
            mount_path: handle.mount_path.clone(),
            cleanup,
            error: settled.err().map(|e| e.to_string()),
            exit_code,
        })
    }

    /// Run the service without a mount point and check its usage contract.
    pub fn usage_check(&self) -> Result<UsageCheckReport, HarnessError> {
        let executable = &self.config.service.executable;
        let name = executable
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.display().to_string());
        let expected_stderr = format!("USAGE: {} MOUNTPOINT", name);

        let output = self
            .supervisor()
            .run_captured(executable, &[] as &[&str], None)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let mut violations = Vec::new();
        if !stdout.is_empty() {
            violations.push(format!("expected empty stdout, got {:?}", stdout));
        }
        if stderr.trim_end() != expected_stderr {
            violations.push(format!(
                "expected stderr {:?}, got {:?}",
                expected_stderr,
                stderr.trim_end()
            ));
        }
        if output.status.success() {
            violations.push("expected a non-zero exit status".to_string());
        }
        for violation in &violations {
            warn!(executable = %executable.display(), "{}", violation);
        }

        Ok(UsageCheckReport {
            executable: executable.clone(),
            expected_stderr,
            stdout,
            stderr,
            exit_code: output.status.code(),
            violations,
        })
    }

    /// Guarded prefix deletion, as exposed by `clean`.
    ///
    /// Without a prefix this removes the run's own artifacts: the snapshot prefix
    /// in the artifact directory unless `dir` says otherwise. An explicit prefix
    /// resolves against `dir` or the working directory.
    pub fn clean(&self, prefix: Option<&str>, dir: Option<&Path>) -> Result<usize, HarnessError> {
        let snapshot = &self.config.snapshot;
        let (prefix, dir) = match prefix {
            Some(prefix) => (prefix, dir),
            None => (
                snapshot.prefix.as_str(),
                Some(dir.unwrap_or(snapshot.artifact_dir.as_path())),
            ),
        };
        let removed = remove_prefixed(prefix, dir)?;
        info!(prefix, removed, "Prefix cleanup finished");
        Ok(removed)
    }

    fn supervisor(&self) -> ProcessSupervisor {
        let unmount = self
            .config
            .unmount
            .clone()
            .unwrap_or_else(UnmountCommand::for_host);
        ProcessSupervisor::new(
            unmount,
            self.config.timing.unmount_timeout(),
            self.cancel.clone(),
        )
    }

    fn snapshot_store(&self) -> Result<SnapshotStore, HarnessError> {
        let snapshot = &self.config.snapshot;
        SnapshotStore::new(
            snapshot.backend,
            self.config.tools.snapshot_tools(snapshot.backend),
            snapshot.prefix.clone(),
            snapshot.artifact_dir.clone(),
        )
    }

    /// Empty the mount directory and drop artifacts left by an earlier run.
    fn clear_leftovers(&self, store: &SnapshotStore) -> Result<(), HarnessError> {
        let mount_path = &self.config.service.mount_path;
        let artifact_dir = store
            .artifact_dir()
            .canonicalize()
            .unwrap_or_else(|_| store.artifact_dir().to_path_buf());
        let mount_resolved = mount_path
            .canonicalize()
            .unwrap_or_else(|_| mount_path.clone());
        if artifact_dir.starts_with(&mount_resolved) {
            return Err(HarnessError::UnsafeCleanupRequest(format!(
                "mount path {} contains the artifact directory",
                mount_path.display()
            )));
        }

        let entries = remove_prefixed("", Some(mount_path))?;
        let artifacts = store.cleanup_artifacts()?;
        if entries + artifacts > 0 {
            info!(entries, artifacts, "Cleared leftovers from an earlier run");
        }
        Ok(())
    }

    fn run_session<F>(&self, command: &str, body: F) -> RunReport
    where
        F: FnOnce(&mut ConsistencyVerifier<'_>) -> Result<(), HarnessError>,
    {
        let started_at = Utc::now();
        let mut store = match self.snapshot_store() {
            Ok(store) => store,
            Err(e) => return self.failed_before_mount(command, e),
        };
        if let Err(e) = self.clear_leftovers(&store) {
            return self.failed_before_mount(command, e);
        }

        let supervisor = self.supervisor();
        let mut handle = match supervisor.mount(
            &self.config.service.executable,
            &self.config.service.mount_path,
        ) {
            Ok(handle) => handle,
            Err(e) => return self.failed_before_mount(command, e),
        };

        let oracle = SignatureOracle::new(self.config.tools.signature.clone());
        let quiescence = quiesce::for_mode(
            self.config.quiescence.mode,
            self.config.timing.stress_settle(),
            self.cancel.clone(),
        );
        let mut injector = self
            .config
            .tools
            .stress
            .clone()
            .map(|script| StressInjector::new(script, self.config.stress.seed));

        let (result, mut outcomes) =
            match supervisor.await_mounted(&mut handle, self.config.timing.mount_settle()) {
                Err(e) => (Err(e), Vec::new()),
                Ok(()) => {
                    let mut verifier = ConsistencyVerifier::new(
                        &supervisor,
                        &oracle,
                        &mut store,
                        quiescence.as_ref(),
                        handle.mount_path.clone(),
                        self.config.timing.restore_settle(),
                    );
                    if let Some(injector) = injector.as_mut() {
                        verifier = verifier.with_stress(injector, self.config.stress.plan());
                    }
                    let result = body(&mut verifier);
                    (result, verifier.finish())
                }
            };

        if let Err(e) = &result {
            error!(command, error = %e, "Run failed; cleaning up");
            let recorded = outcomes.last().map(|o| !o.is_pass()).unwrap_or(false);
            if !recorded {
                outcomes.push(VerificationOutcome::from_error(e));
            }
        }

        let cleanup = CleanupCoordinator::new(&supervisor, self.config.timing.cleanup_settle())
            .run(Some(&mut handle), Some(&store));
        let exit_code = exit_code_for(result.is_ok(), cleanup.service_exit_code);
        info!(command, exit_code, "Run finished");

        RunReport {
            command: command.to_string(),
            started_at,
            finished_at: Utc::now(),
            mount_path: handle.mount_path.clone(),
            backend: store.backend(),
            records: store.records().to_vec(),
            outcomes,
            cleanup: Some(cleanup),
            error: result.err().map(|e| e.to_string()),
            exit_code,
        }
    }

    fn failed_before_mount(&self, command: &str, err: HarnessError) -> RunReport {
        error!(command, error = %err, "Run failed before mounting");
        let now = Utc::now();
        RunReport {
            command: command.to_string(),
            started_at: now,
            finished_at: now,
            mount_path: self.config.service.mount_path.clone(),
            backend: self.config.snapshot.backend,
            records: Vec::new(),
            outcomes: vec![VerificationOutcome::from_error(&err)],
            cleanup: None,
            error: Some(err.to_string()),
            exit_code: FAILURE_EXIT_CODE,
        }
    }
}
