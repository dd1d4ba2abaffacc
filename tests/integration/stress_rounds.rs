//! Randomized stress rounds with the stand-in racer script.

use crate::integration::test_utils::{write_script, Rig};
use snapverify::interrupt::CancelToken;
use snapverify::types::VerificationOutcome;
use snapverify::Harness;
use std::thread;
use std::time::Duration;

#[test]
fn test_stress_rounds_pass_and_draw_within_ranges() {
    let rig = Rig::new();
    let report = Harness::new(rig.config(), CancelToken::new()).stress();

    assert!(report.passed(), "run failed: {:?}", report.error);
    assert_eq!(report.command, "stress");

    // Rounds are drawn from [2, 3): two rounds, each saving once and verifying once.
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(VerificationOutcome::is_pass));

    // Each round runs the racer twice: before the save and as the mutation.
    let log = rig.stress_log();
    assert_eq!(log.len(), 4);
    let mount = rig.mount_path();
    for line in &log {
        let args: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(args.len(), 3, "unexpected racer args: {}", line);
        assert_eq!(args[0], mount.display().to_string());
        let duration: u32 = args[1].parse().unwrap();
        let threads: u32 = args[2].parse().unwrap();
        assert_eq!(duration, 1);
        assert!((1..4).contains(&threads));
    }

    let cleanup = report.cleanup.unwrap();
    assert_eq!(cleanup.jobs_terminated, 0);
    assert_eq!(cleanup.service_exit_code, Some(0));
}

#[test]
fn test_same_seed_draws_same_parameters() {
    let first = Rig::new();
    let second = Rig::new();
    assert!(Harness::new(first.config(), CancelToken::new()).stress().passed());
    assert!(Harness::new(second.config(), CancelToken::new()).stress().passed());

    let params = |rig: &Rig| -> Vec<String> {
        rig.stress_log()
            .iter()
            .map(|line| line.split_whitespace().skip(1).collect::<Vec<_>>().join(" "))
            .collect()
    };
    assert_eq!(params(&first), params(&second));
}

#[test]
fn test_empty_round_range_fails_without_saving() {
    let rig = Rig::new();
    let mut config = rig.config();
    config.stress.rounds.high = config.stress.rounds.low;
    let report = Harness::new(config, CancelToken::new()).stress();

    assert!(!report.passed());
    assert!(report.records.is_empty());
    assert!(report.error.unwrap().contains("Invalid range"));
    assert_eq!(report.cleanup.unwrap().service_exit_code, Some(0));
}

#[test]
fn test_interrupt_mid_stress_stops_job_and_its_workers() {
    let rig = Rig::new();
    let late = rig.root.join("late");
    write_script(
        &rig.tool("racer"),
        &format!(
            "#!/bin/sh\n(sleep 1; touch '{}') &\nsleep 30\n",
            late.display()
        ),
    );
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(400));
        trigger.cancel();
    });

    let report = Harness::new(rig.config(), cancel).stress();
    interrupter.join().unwrap();

    assert!(!report.passed());
    assert!(report.error.unwrap().contains("Interrupted"));
    let cleanup = report.cleanup.expect("cleanup runs on interrupt");
    assert_eq!(cleanup.jobs_terminated, 1);
    assert_eq!(cleanup.service_exit_code, Some(0));

    thread::sleep(Duration::from_millis(1500));
    assert!(!late.exists(), "a stress worker outlived cleanup");
}
