//! The deterministic end-to-end scenario.
//!
//! 1. Create `entries` directories and files, save snapshot 0.
//! 2. Create as many again, nest a directory with `nested_files` executable
//!    files under each of the first `entries` directories, save snapshot 1.
//! 3. Restore 0 and verify, then restore 1 and verify.
//! 4. Rename every top-level directory, move the first into the third, save 2.
//! 5. Delete everything, restore 2 and verify.

use super::{ConsistencyVerifier, Workload};
use crate::error::HarnessError;
use crate::types::VerificationOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Sizes of the scenario's workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioCounts {
    /// Directories and files created per batch.
    #[serde(default = "default_entries")]
    pub entries: usize,
    /// Files created inside each nested directory.
    #[serde(default = "default_nested_files")]
    pub nested_files: usize,
}

fn default_entries() -> usize {
    100
}

fn default_nested_files() -> usize {
    5
}

impl Default for ScenarioCounts {
    fn default() -> Self {
        Self {
            entries: default_entries(),
            nested_files: default_nested_files(),
        }
    }
}

fn dir_name(i: usize) -> String {
    format!("dir_1_{}", i)
}

fn file_name(i: usize) -> String {
    format!("file_1_{}", i)
}

fn renamed_dir_name(i: usize) -> String {
    format!("new_dir_1_{}", i)
}

/// Top-level directories and files `range.start..range.end`.
pub fn create_entries(range: std::ops::Range<usize>) -> Workload {
    range.fold(Workload::new(), |w, i| {
        w.mkdir("", &dir_name(i)).touch("", &file_name(i))
    })
}

/// One nested directory per top-level directory, holding executable files.
pub fn create_nested(counts: ScenarioCounts) -> Workload {
    (0..counts.entries).fold(Workload::new(), |w, i| {
        let parent = dir_name(i);
        let nested_name = format!("dir_2_{}", i);
        let nested = format!("{}/{}", parent, nested_name);
        let w = w.mkdir(&parent, &nested_name);
        (0..counts.nested_files).fold(w, |w, j| {
            let file = format!("file_2_{}", j);
            w.touch(&nested, &file).chmod(&nested, "a+x", &file)
        })
    })
}

/// Rename every top-level directory, then move the first inside the third.
pub fn rename_and_nest(total_dirs: usize) -> Workload {
    let w = (0..total_dirs).fold(Workload::new(), |w, i| {
        w.rename("", &dir_name(i), &renamed_dir_name(i))
    });
    if total_dirs < 3 {
        warn!(total_dirs, "Too few directories to nest; skipping the move");
        return w;
    }
    let first = renamed_dir_name(0);
    w.rename("", &first, &format!("{}/{}", renamed_dir_name(2), first))
}

/// Run the whole scenario. Every verification passes or the first failure is raised.
pub fn run_end_to_end(
    verifier: &mut ConsistencyVerifier<'_>,
    counts: ScenarioCounts,
) -> Result<Vec<VerificationOutcome>, HarnessError> {
    let n = counts.entries;
    info!(entries = n, nested_files = counts.nested_files, "Running end-to-end scenario");

    verifier.apply_workload(&create_entries(0..n))?;
    let first = verifier.save()?;

    verifier.apply_workload(&create_entries(n..2 * n).then(create_nested(counts)))?;
    let second = verifier.save()?;

    let mut passed = vec![verifier.restore_and_verify(first.index)?];
    passed.push(verifier.restore_and_verify(second.index)?);

    verifier.mutate(&rename_and_nest(2 * n))?;
    let third = verifier.save()?;

    verifier.mutate(&Workload::new().clear_mount())?;
    passed.push(verifier.restore_and_verify(third.index)?);

    info!(verified = passed.len(), "End-to-end scenario passed");
    Ok(passed)
}
