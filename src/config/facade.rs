//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::HarnessConfig;
use crate::error::HarnessError;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from files and environment.
    pub fn load(workspace_root: &Path) -> Result<HarnessConfig, ConfigError> {
        MergeService::load(workspace_root)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<HarnessConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Load (from `config_path` if given), validate, and resolve paths against the workspace.
    pub fn load_validated(
        workspace_root: &Path,
        config_path: Option<&Path>,
    ) -> Result<HarnessConfig, HarnessError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load(workspace_root)?,
        };
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            HarnessError::Config(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        // Tools run with other working directories, so anchor on an absolute root.
        let root = workspace_root
            .canonicalize()
            .unwrap_or_else(|_| workspace_root.to_path_buf());
        config.resolve_paths(&root);
        Ok(config)
    }
}
