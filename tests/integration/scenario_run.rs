//! End-to-end scenario runs against the stand-in tools.

use crate::integration::test_utils::Rig;
use snapverify::interrupt::CancelToken;
use snapverify::snapshot::SnapshotBackend;
use snapverify::types::VerificationOutcome;
use snapverify::Harness;

#[test]
fn test_end_to_end_scenario_passes_and_cleans_up() {
    let rig = Rig::new();
    let report = Harness::new(rig.config(), CancelToken::new()).verify();

    assert!(report.passed(), "run failed: {:?}", report.error);
    assert_eq!(report.exit_code, 0);

    let indices: Vec<usize> = report.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    let artifacts: Vec<&str> = report.records.iter().map(|r| r.artifact.as_str()).collect();
    assert_eq!(artifacts, vec!["pickle_tmp0", "pickle_tmp1", "pickle_tmp2"]);

    let verified: Vec<usize> = report
        .outcomes
        .iter()
        .map(|o| match o {
            VerificationOutcome::Pass { index, .. } => *index,
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect();
    assert_eq!(verified, vec![0, 1, 2]);

    let cleanup = report.cleanup.expect("cleanup ran");
    assert!(cleanup.is_clean());
    assert_eq!(cleanup.service_exit_code, Some(0));
    assert_eq!(cleanup.artifacts_removed, 3);
    assert!(rig.leftover_artifacts().is_empty());
    assert!(!rig.unmount_marker().exists(), "service consumed the marker");
}

#[test]
fn test_saved_states_differ_between_snapshots() {
    let rig = Rig::new();
    let report = Harness::new(rig.config(), CancelToken::new()).verify();
    assert!(report.passed());
    assert_ne!(report.records[0].signature, report.records[1].signature);
    assert_ne!(report.records[1].signature, report.records[2].signature);
}

#[test]
fn test_checkpoint_backend_runs_the_same_scenario() {
    let rig = Rig::new();
    let mut config = rig.config();
    config.snapshot.backend = SnapshotBackend::Checkpoint;
    let report = Harness::new(config, CancelToken::new()).verify();

    assert!(report.passed(), "run failed: {:?}", report.error);
    let artifacts: Vec<&str> = report.records.iter().map(|r| r.artifact.as_str()).collect();
    assert_eq!(artifacts, vec!["0", "1", "2"]);
    assert_eq!(report.cleanup.unwrap().artifacts_removed, 0);
    assert!(rig.bin.join("ckpt-2.tar").exists());
}

#[test]
fn test_restore_that_does_nothing_is_a_mismatch() {
    let rig = Rig::new();
    let mut config = rig.config();
    config.tools.load = rig.tool("load-noop");
    let report = Harness::new(config, CancelToken::new()).verify();

    assert!(!report.passed());
    assert_eq!(report.exit_code, 1);
    match report.outcomes.last() {
        Some(VerificationOutcome::Mismatch {
            index,
            expected,
            actual,
        }) => {
            assert_eq!(*index, 0);
            assert_ne!(expected, actual);
        }
        other => panic!("expected a mismatch, got {:?}", other),
    }
    assert!(report.error.unwrap().contains("discrepancy"));

    let cleanup = report.cleanup.expect("cleanup still runs after a mismatch");
    assert_eq!(cleanup.service_exit_code, Some(0));
    assert!(rig.leftover_artifacts().is_empty());
}

#[test]
fn test_transient_reading_fails_the_run_without_a_signature() {
    let rig = Rig::new();
    let mut config = rig.config();
    config.tools.signature = rig.tool("sig-transient");
    let report = Harness::new(config, CancelToken::new()).verify();

    assert!(!report.passed());
    assert!(report.records.is_empty(), "nothing may be saved on a transient reading");
    match report.outcomes.last() {
        Some(VerificationOutcome::OracleTransient { diagnostic }) => {
            assert!(diagnostic.contains("iterating..."));
        }
        other => panic!("expected a transient outcome, got {:?}", other),
    }
    assert_eq!(report.cleanup.unwrap().service_exit_code, Some(0));
}

#[test]
fn test_interrupt_before_run_still_unmounts() {
    let rig = Rig::new();
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = Harness::new(rig.config(), cancel).verify();

    assert!(!report.passed());
    assert!(report.error.unwrap().contains("Interrupted"));
    let cleanup = report.cleanup.expect("cleanup runs on interrupt");
    assert_eq!(cleanup.service_exit_code, Some(0));
    assert!(!rig.unmount_marker().exists());
}
