//! Waiting for the filesystem to go quiet after a workload.
//!
//! Stress workers can briefly outlive the launcher. Before the next snapshot or
//! signature query the run waits for quiescence, either by a fixed delay
//! (unattended) or by asking an operator to confirm (interactive).

use crate::error::HarnessError;
use crate::interrupt::CancelToken;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Which quiescence strategy a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuiescenceMode {
    #[default]
    Delay,
    Interactive,
}

/// Blocks until it is safe to observe the filesystem again.
pub trait Quiescence {
    fn await_quiescence(&self, reason: &str) -> Result<(), HarnessError>;
}

/// Unattended: sleep for a fixed, interruptible delay.
pub struct FixedDelay {
    delay: Duration,
    cancel: CancelToken,
}

impl FixedDelay {
    pub fn new(delay: Duration, cancel: CancelToken) -> Self {
        Self { delay, cancel }
    }
}

impl Quiescence for FixedDelay {
    fn await_quiescence(&self, reason: &str) -> Result<(), HarnessError> {
        debug!(reason, delay_ms = self.delay.as_millis() as u64, "Settling");
        self.cancel.sleep(self.delay)
    }
}

/// Interactive: the operator confirms all workers have exited.
pub struct OperatorConfirm {
    retry_delay: Duration,
    cancel: CancelToken,
}

impl OperatorConfirm {
    pub fn new(retry_delay: Duration, cancel: CancelToken) -> Self {
        Self {
            retry_delay,
            cancel,
        }
    }
}

impl Quiescence for OperatorConfirm {
    fn await_quiescence(&self, reason: &str) -> Result<(), HarnessError> {
        use dialoguer::Confirm;
        loop {
            self.cancel.check()?;
            let confirmed = Confirm::new()
                .with_prompt(format!("{}: have all stress workers exited?", reason))
                .default(false)
                .interact()
                .map_err(|e| {
                    // An interrupted prompt surfaces as an I/O error.
                    if self.cancel.is_cancelled() {
                        HarnessError::Interrupted
                    } else {
                        HarnessError::Config(format!("Failed to get user input: {}", e))
                    }
                })?;
            if confirmed {
                info!(reason, "Operator confirmed quiescence");
                return Ok(());
            }
            self.cancel.sleep(self.retry_delay)?;
        }
    }
}

/// Build the strategy selected by configuration.
pub fn for_mode(mode: QuiescenceMode, delay: Duration, cancel: CancelToken) -> Box<dyn Quiescence> {
    match mode {
        QuiescenceMode::Delay => Box::new(FixedDelay::new(delay, cancel)),
        QuiescenceMode::Interactive => Box::new(OperatorConfirm::new(delay, cancel)),
    }
}
