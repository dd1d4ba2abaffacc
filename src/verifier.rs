//! Consistency verifier
//!
//! Drives one run through the verification state machine:
//!
//! ```text
//! Idle -> WorkloadApplied -> SnapshotSaved -> StateMutated -> SnapshotRestored
//!      -> Verified -> (WorkloadApplied | Done)
//! ```
//!
//! A mismatch or any component failure ends the run; the outcome is recorded
//! before the error is raised so the report always carries it.

pub mod scenario;
pub mod workload;

use crate::error::HarnessError;
use crate::oracle::SignatureOracle;
use crate::quiesce::Quiescence;
use crate::snapshot::SnapshotStore;
use crate::stress::{StressInjector, StressPlan};
use crate::supervisor::ProcessSupervisor;
use crate::types::{SnapshotRecord, VerificationOutcome};
use std::ffi::OsString;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub use workload::{Workload, WorkloadStep};

/// Where the verifier is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    WorkloadApplied,
    SnapshotSaved,
    StateMutated,
    SnapshotRestored,
    Verified,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "IDLE",
            Phase::WorkloadApplied => "WORKLOAD_APPLIED",
            Phase::SnapshotSaved => "SNAPSHOT_SAVED",
            Phase::StateMutated => "STATE_MUTATED",
            Phase::SnapshotRestored => "SNAPSHOT_RESTORED",
            Phase::Verified => "VERIFIED",
            Phase::Done => "DONE",
        };
        f.write_str(name)
    }
}

struct StressSource<'a> {
    injector: &'a mut StressInjector,
    plan: StressPlan,
}

pub struct ConsistencyVerifier<'a> {
    supervisor: &'a ProcessSupervisor,
    oracle: &'a SignatureOracle,
    store: &'a mut SnapshotStore,
    quiescence: &'a dyn Quiescence,
    stress: Option<StressSource<'a>>,
    mount_path: PathBuf,
    restore_settle: Duration,
    phase: Phase,
    outcomes: Vec<VerificationOutcome>,
}

impl<'a> ConsistencyVerifier<'a> {
    pub fn new(
        supervisor: &'a ProcessSupervisor,
        oracle: &'a SignatureOracle,
        store: &'a mut SnapshotStore,
        quiescence: &'a dyn Quiescence,
        mount_path: impl Into<PathBuf>,
        restore_settle: Duration,
    ) -> Self {
        Self {
            supervisor,
            oracle,
            store,
            quiescence,
            stress: None,
            mount_path: mount_path.into(),
            restore_settle,
            phase: Phase::Idle,
            outcomes: Vec::new(),
        }
    }

    /// Enable stress workloads.
    pub fn with_stress(mut self, injector: &'a mut StressInjector, plan: StressPlan) -> Self {
        self.stress = Some(StressSource { injector, plan });
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    pub fn store(&self) -> &SnapshotStore {
        self.store
    }

    pub fn outcomes(&self) -> &[VerificationOutcome] {
        &self.outcomes
    }

    /// Apply a workload that builds the state about to be saved.
    pub fn apply_workload(&mut self, workload: &Workload) -> Result<(), HarnessError> {
        self.run_steps(workload)?;
        self.transition(Phase::WorkloadApplied);
        Ok(())
    }

    /// Apply a workload that diverges the filesystem from the last saved state.
    pub fn mutate(&mut self, workload: &Workload) -> Result<(), HarnessError> {
        self.run_steps(workload)?;
        self.transition(Phase::StateMutated);
        Ok(())
    }

    pub fn save(&mut self) -> Result<SnapshotRecord, HarnessError> {
        let record = self
            .store
            .save(self.supervisor, self.oracle, &self.mount_path)?;
        self.transition(Phase::SnapshotSaved);
        Ok(record)
    }

    /// Restore snapshot `index` and wait for the load to become observable.
    pub fn restore(&mut self, index: usize) -> Result<(), HarnessError> {
        self.store.restore(self.supervisor, &self.mount_path, index)?;
        self.supervisor.cancel_token().sleep(self.restore_settle)?;
        self.transition(Phase::SnapshotRestored);
        Ok(())
    }

    /// Compare a fresh signature with the one recorded for `index`.
    ///
    /// Returns the `Pass` outcome; a mismatch or a transient reading is recorded
    /// and then raised.
    pub fn verify(&mut self, index: usize) -> Result<VerificationOutcome, HarnessError> {
        let expected = self
            .store
            .get(index)
            .ok_or(HarnessError::UnknownSnapshot(index))?
            .signature
            .clone();

        let actual = match self.oracle.capture(self.supervisor, &self.mount_path) {
            Ok(signature) => signature,
            Err(e) => {
                self.outcomes.push(VerificationOutcome::from_error(&e));
                self.transition(Phase::Done);
                return Err(e);
            }
        };

        let outcome = if actual == expected {
            info!(
                index,
                signature = %actual,
                "Restored snapshot passed verification"
            );
            VerificationOutcome::Pass {
                index,
                signature: actual,
            }
        } else {
            error!(
                index,
                expected = %expected,
                actual = %actual,
                "Restored snapshot signature differs"
            );
            VerificationOutcome::Mismatch {
                index,
                expected,
                actual,
            }
        };
        self.outcomes.push(outcome.clone());
        self.transition(if outcome.is_pass() {
            Phase::Verified
        } else {
            Phase::Done
        });
        outcome.into_result()
    }

    pub fn restore_and_verify(&mut self, index: usize) -> Result<VerificationOutcome, HarnessError> {
        self.restore(index)?;
        self.verify(index)
    }

    /// Randomized stress rounds. The round count is drawn from `rounds`.
    ///
    /// Each round: stress, save, fresh stress, restore the latest snapshot, verify.
    /// Returns the number of rounds that passed.
    pub fn run_stress_rounds(&mut self, rounds: Range<u32>) -> Result<u32, HarnessError> {
        let total = self.stress_source()?.injector.draw(rounds, "stress rounds")?;
        info!(rounds = total, "Starting stress rounds");

        let workload = Workload::new().stress();
        for round in 0..total {
            debug!(round, "Stress round");
            self.apply_workload(&workload)?;
            let record = self.save()?;
            self.mutate(&workload)?;
            self.restore_and_verify(record.index)?;
        }
        Ok(total)
    }

    /// End the run and hand back every recorded outcome.
    pub fn finish(mut self) -> Vec<VerificationOutcome> {
        if self.phase != Phase::Done {
            self.transition(Phase::Done);
        }
        self.outcomes
    }

    fn transition(&mut self, next: Phase) {
        info!(from = %self.phase, to = %next, "Verifier transition");
        self.phase = next;
    }

    fn stress_source(&mut self) -> Result<&mut StressSource<'a>, HarnessError> {
        self.stress.as_mut().ok_or_else(|| {
            HarnessError::Config("Stress workload requested without a stress script".to_string())
        })
    }

    fn run_steps(&mut self, workload: &Workload) -> Result<(), HarnessError> {
        debug!(steps = workload.len(), "Applying workload");
        for step in workload.steps() {
            self.supervisor.cancel_token().check()?;
            match step {
                WorkloadStep::Command { argv, cwd } => {
                    self.supervisor
                        .spawn_blocking(argv, &self.mount_path.join(cwd))?;
                }
                WorkloadStep::Stress => {
                    let mount_path = self.mount_path.clone();
                    let supervisor = self.supervisor;
                    let source = self.stress_source()?;
                    let plan = source.plan.clone();
                    source
                        .injector
                        .run(supervisor, &mount_path, plan.duration_secs, plan.threads)?;
                    self.quiescence.await_quiescence("After stress workload")?;
                }
                WorkloadStep::ClearMount => self.clear_mount()?,
            }
        }
        Ok(())
    }

    /// `rm -rf` every entry of the mount root, named explicitly.
    fn clear_mount(&self) -> Result<(), HarnessError> {
        let mut entries: Vec<OsString> = std::fs::read_dir(&self.mount_path)?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.file_name()),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable mount entry");
                    None
                }
            })
            .collect();
        if entries.is_empty() {
            debug!("Mount already empty");
            return Ok(());
        }
        entries.sort();
        info!(entries = entries.len(), "Clearing mount");

        let mut argv: Vec<OsString> = vec!["rm".into(), "-rf".into(), "--".into()];
        argv.extend(entries);
        self.supervisor.spawn_blocking(&argv, &self.mount_path)?;
        Ok(())
    }
}
