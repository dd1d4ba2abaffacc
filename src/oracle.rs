//! Signature oracle
//!
//! Asks the external fingerprinting tool for the canonical signature of the
//! mounted filesystem. The signature is the last whitespace-delimited token of the
//! tool's output.
//!
//! The tool walks the tree and can catch it mid-mutation; it then reports the
//! transient marker instead of a signature. A transient reading is a hard failure
//! and is never retried into a trusted signature: one more invocation is made only
//! to collect diagnostic output for the report.

use crate::error::HarnessError;
use crate::supervisor::ProcessSupervisor;
use crate::types::Signature;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Output the signature tool prints when it could not get a stable reading.
pub const TRANSIENT_MARKER: &str = "iterating...";

/// Queries the external signature tool.
#[derive(Debug, Clone)]
pub struct SignatureOracle {
    tool: PathBuf,
}

/// What a single tool invocation produced.
#[derive(Debug, PartialEq, Eq)]
enum Reading {
    Stable(Signature),
    Transient,
    Empty,
}

impl SignatureOracle {
    pub fn new(tool: PathBuf) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Capture the current signature of the filesystem mounted at `mount_path`.
    pub fn capture(
        &self,
        supervisor: &ProcessSupervisor,
        mount_path: &Path,
    ) -> Result<Signature, HarnessError> {
        let output = supervisor.run_captured(&self.tool, &[mount_path], None)?;
        if !output.status.success() {
            warn!(
                tool = %self.tool.display(),
                status = %output.status,
                "Signature tool exited non-zero"
            );
        }

        match parse_reading(&output.stdout) {
            Reading::Stable(signature) => {
                debug!(signature = %signature, "Signature captured");
                Ok(signature)
            }
            Reading::Transient => {
                let diagnostic = self.diagnose(supervisor, mount_path);
                error!(mount_path = %mount_path.display(), "Transient signature reading");
                Err(HarnessError::OracleTransient { diagnostic })
            }
            Reading::Empty => Err(HarnessError::OracleFailed(format!(
                "{} produced no output ({}): {}",
                self.tool.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    /// Re-run the tool once to collect its full output for the failure report.
    fn diagnose(&self, supervisor: &ProcessSupervisor, mount_path: &Path) -> String {
        match supervisor.run_captured(&self.tool, &[mount_path], None) {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    text.push_str(&stderr);
                }
                text.trim_end().to_string()
            }
            Err(e) => format!("(diagnostic run failed: {})", e),
        }
    }
}

fn parse_reading(stdout: &[u8]) -> Reading {
    let text = String::from_utf8_lossy(stdout);
    if text.lines().any(|line| line.trim() == TRANSIENT_MARKER) {
        return Reading::Transient;
    }
    match last_token(stdout) {
        Some(token) if token == TRANSIENT_MARKER.as_bytes() => Reading::Transient,
        Some(token) => Reading::Stable(Signature::new(token.to_vec())),
        None => Reading::Empty,
    }
}

fn last_token(bytes: &[u8]) -> Option<&[u8]> {
    bytes
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .last()
}
