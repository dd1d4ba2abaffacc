//! Operator interrupt handling.
//!
//! SIGINT and SIGTERM raise a shared cancellation flag. Nothing is torn down from
//! inside the handler: blocking waits poll the flag and return
//! [`HarnessError::Interrupted`], which the top-level handler routes through cleanup.

use crate::error::HarnessError;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static HANDLER_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Granularity at which blocking waits check for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

extern "C" fn on_signal(_: nix::libc::c_int) {
    if let Some(flag) = HANDLER_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Cloneable cancellation flag shared by every blocking step of a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token no signal handler is attached to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install SIGINT/SIGTERM handlers bound to a process-wide token.
    ///
    /// Calling this twice returns the same token.
    pub fn install() -> Result<Self, HarnessError> {
        let flag = HANDLER_FLAG
            .get_or_init(|| Arc::new(AtomicBool::new(false)))
            .clone();
        let action = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only performs an atomic store.
            unsafe { sigaction(signal, &action) }.map_err(|e| {
                HarnessError::Config(format!("Failed to install {} handler: {}", signal, e))
            })?;
        }
        debug!("Interrupt handlers installed");
        Ok(Self { flag })
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with `Interrupted` once the flag is raised.
    pub fn check(&self) -> Result<(), HarnessError> {
        if self.is_cancelled() {
            warn!("Interrupt observed");
            Err(HarnessError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with `Interrupted` if the flag is raised.
    pub fn sleep(&self, duration: Duration) -> Result<(), HarnessError> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
