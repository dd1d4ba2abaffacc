//! Stress injector
//!
//! Launches the external racer script with a randomly drawn duration and thread
//! count and blocks until it exits. The script owns its workers and its lifetime;
//! the only hard stop is an interrupt, after which cleanup terminates the job.

use crate::error::HarnessError;
use crate::supervisor::ProcessSupervisor;
use crate::types::StressJobHandle;
use rand::distributions::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ffi::OsString;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Ranges a stress run draws its parameters from, each half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressPlan {
    pub duration_secs: Range<u32>,
    pub threads: Range<u32>,
}

pub struct StressInjector {
    script: PathBuf,
    rng: StdRng,
}

impl StressInjector {
    /// A fixed `seed` makes the drawn parameters reproducible across runs.
    pub fn new(script: PathBuf, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { script, rng }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Draw uniformly from the half-open `range`.
    pub fn draw<T>(&mut self, range: Range<T>, name: &str) -> Result<T, HarnessError>
    where
        T: SampleUniform + PartialOrd + Copy + Into<u64>,
    {
        draw_from(&mut self.rng, range, name)
    }

    /// Run one stress job against `mount_path` and wait for it to finish.
    pub fn run(
        &mut self,
        supervisor: &ProcessSupervisor,
        mount_path: &Path,
        duration_secs: Range<u32>,
        threads: Range<u32>,
    ) -> Result<StressJobHandle, HarnessError> {
        let duration = self.draw(duration_secs, "stress duration")?;
        let thread_count = self.draw(threads, "stress threads")?;
        info!(
            script = %self.script.display(),
            duration_secs = duration,
            threads = thread_count,
            "Starting stress workload"
        );

        let args: Vec<OsString> = vec![
            mount_path.as_os_str().to_owned(),
            duration.to_string().into(),
            thread_count.to_string().into(),
        ];
        let mut job = supervisor.launch_job(
            &self.script,
            args.as_slice(),
            Duration::from_secs(u64::from(duration)),
            thread_count,
        )?;
        supervisor.wait_job(&mut job)?;
        Ok(job)
    }
}

fn draw_from<T, R>(rng: &mut R, range: Range<T>, name: &str) -> Result<T, HarnessError>
where
    T: SampleUniform + PartialOrd + Copy + Into<u64>,
    R: Rng,
{
    if range.start >= range.end {
        return Err(HarnessError::InvalidRange {
            name: name.to_string(),
            low: range.start.into(),
            high: range.end.into(),
        });
    }
    Ok(rng.gen_range(range))
}
