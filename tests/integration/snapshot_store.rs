//! Snapshot store against real save/load tools.

use crate::integration::test_utils::Rig;
use proptest::prelude::*;
use snapverify::interrupt::CancelToken;
use snapverify::oracle::SignatureOracle;
use snapverify::snapshot::{SnapshotBackend, SnapshotStore, SnapshotTools};
use snapverify::supervisor::{ProcessSupervisor, UnmountCommand};
use snapverify::HarnessError;
use std::fs;
use std::time::Duration;

fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new(
        UnmountCommand {
            program: "true".to_string(),
            args: vec![],
        },
        Duration::from_secs(5),
        CancelToken::new(),
    )
}

fn pickle_store(rig: &Rig) -> SnapshotStore {
    SnapshotStore::new(
        SnapshotBackend::Pickle,
        SnapshotTools {
            save: rig.tool("pkl"),
            load: rig.tool("load"),
        },
        "pickle_tmp",
        rig.artifact_dir(),
    )
    .unwrap()
}

#[test]
fn test_restore_brings_back_saved_signature() {
    let rig = Rig::new();
    let mount = rig.mount_path();
    fs::create_dir_all(mount.join("a")).unwrap();
    let sup = supervisor();
    let oracle = SignatureOracle::new(rig.tool("sig"));
    let mut store = pickle_store(&rig);

    let saved = store.save(&sup, &oracle, &mount).unwrap();
    assert!(rig.artifact_dir().join("pickle_tmp0").exists());

    fs::create_dir_all(mount.join("b")).unwrap();
    assert_ne!(oracle.capture(&sup, &mount).unwrap(), saved.signature);

    store.restore(&sup, &mount, 0).unwrap();
    assert_eq!(oracle.capture(&sup, &mount).unwrap(), saved.signature);
    assert!(!mount.join("b").exists());
}

#[test]
fn test_restore_of_unknown_index_fails() {
    let rig = Rig::new();
    let store = pickle_store(&rig);
    let err = store.restore(&supervisor(), &rig.mount_path(), 3).unwrap_err();
    assert!(matches!(err, HarnessError::UnknownSnapshot(3)));
}

#[test]
fn test_artifact_cleanup_is_idempotent() {
    let rig = Rig::new();
    let mount = rig.mount_path();
    fs::create_dir_all(&mount).unwrap();
    let sup = supervisor();
    let oracle = SignatureOracle::new(rig.tool("sig"));
    let mut store = pickle_store(&rig);
    store.save(&sup, &oracle, &mount).unwrap();
    store.save(&sup, &oracle, &mount).unwrap();
    fs::write(rig.artifact_dir().join("unrelated"), "x").unwrap();

    assert_eq!(store.cleanup_artifacts().unwrap(), 2);
    assert_eq!(store.cleanup_artifacts().unwrap(), 0);
    assert!(rig.leftover_artifacts().is_empty());
    assert!(rig.artifact_dir().join("unrelated").exists());
}

#[test]
fn test_transient_reading_records_nothing() {
    let rig = Rig::new();
    let mount = rig.mount_path();
    fs::create_dir_all(&mount).unwrap();
    let mut store = pickle_store(&rig);
    let oracle = SignatureOracle::new(rig.tool("sig-transient"));

    let err = store.save(&supervisor(), &oracle, &mount).unwrap_err();
    assert!(matches!(err, HarnessError::OracleTransient { .. }));
    assert!(store.records().is_empty());
    assert!(rig.leftover_artifacts().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    #[test]
    fn prop_indices_follow_call_order(saves in 1usize..5) {
        let rig = Rig::new();
        let mount = rig.mount_path();
        fs::create_dir_all(&mount).unwrap();
        let sup = supervisor();
        let oracle = SignatureOracle::new(rig.tool("sig"));
        let mut store = pickle_store(&rig);

        for expected in 0..saves {
            let record = store.save(&sup, &oracle, &mount).unwrap();
            prop_assert_eq!(record.index, expected);
            prop_assert_eq!(record.artifact, format!("pickle_tmp{}", expected));
        }
        prop_assert_eq!(store.records().len(), saves);
        prop_assert_eq!(store.latest().map(|r| r.index), Some(saves - 1));
    }
}
