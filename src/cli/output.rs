//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::HarnessError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &HarnessError) -> String {
    match e {
        HarnessError::Interrupted => "Interrupted; cleanup ran before exit".to_string(),
        HarnessError::Config(msg) => format!("Configuration error: {}", msg),
        other => format!("Error: {}", other),
    }
}
