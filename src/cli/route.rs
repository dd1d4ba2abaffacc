//! CLI route: single route table and run context. Dispatches to the harness and presentation.

use crate::cli::help::{command_name, mounts_service};
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_mount_check_text, format_run_report_text, format_usage_check_text, to_json,
};
use crate::config::{ConfigLoader, HarnessConfig};
use crate::error::HarnessError;
use crate::harness::Harness;
use crate::interrupt::CancelToken;
use crate::quiesce::QuiescenceMode;
use crate::report::FAILURE_EXIT_CODE;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a command prints and how the process should exit.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
    /// Failure summary for stderr; the report itself goes to stdout.
    pub error: Option<String>,
}

impl CommandOutput {
    fn success(text: String) -> Self {
        Self {
            text,
            exit_code: 0,
            error: None,
        }
    }
}

/// Runtime context for CLI execution: workspace, resolved config, and interrupt token.
pub struct RunContext {
    workspace_root: PathBuf,
    config: HarnessConfig,
    cancel: CancelToken,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, HarnessError> {
        let config = ConfigLoader::load_validated(&workspace_root, config_path.as_deref())?;
        let cancel = CancelToken::install()?;
        Ok(Self {
            workspace_root,
            config,
            cancel,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Execute a command through the single route table.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, HarnessError> {
        let name = command_name(command);
        info!(command = name, workspace = %self.workspace_root.display(), "Executing command");
        if mounts_service(command) {
            info!(
                executable = %self.config.service.executable.display(),
                mount_path = %self.config.service.mount_path.display(),
                "Service under test"
            );
        }

        match command {
            Commands::Verify { format } => {
                let report = self.harness(self.config.clone()).verify();
                let text = match format.as_str() {
                    "json" => to_json(&report)?,
                    _ => format_run_report_text(&report),
                };
                Ok(CommandOutput {
                    text,
                    exit_code: report.exit_code,
                    error: report.error,
                })
            }
            Commands::Stress {
                format,
                seed,
                interactive,
            } => {
                let mut config = self.config.clone();
                if seed.is_some() {
                    config.stress.seed = *seed;
                }
                if *interactive {
                    config.quiescence.mode = QuiescenceMode::Interactive;
                }
                let report = self.harness(config).stress();
                let text = match format.as_str() {
                    "json" => to_json(&report)?,
                    _ => format_run_report_text(&report),
                };
                Ok(CommandOutput {
                    text,
                    exit_code: report.exit_code,
                    error: report.error,
                })
            }
            Commands::MountCheck { format } => {
                let report = self.harness(self.config.clone()).mount_check()?;
                let text = match format.as_str() {
                    "json" => to_json(&report)?,
                    _ => format_mount_check_text(&report),
                };
                Ok(CommandOutput {
                    text,
                    exit_code: report.exit_code,
                    error: report.error,
                })
            }
            Commands::UsageCheck { format } => {
                let report = self.harness(self.config.clone()).usage_check()?;
                let text = match format.as_str() {
                    "json" => to_json(&report)?,
                    _ => format_usage_check_text(&report),
                };
                let passed = report.passed();
                Ok(CommandOutput {
                    text,
                    exit_code: if passed { 0 } else { FAILURE_EXIT_CODE },
                    error: (!passed).then(|| "Usage contract violated".to_string()),
                })
            }
            Commands::Clean { prefix, dir } => {
                let removed = self
                    .harness(self.config.clone())
                    .clean(prefix.as_deref(), dir.as_deref())?;
                Ok(CommandOutput::success(format!("Removed {} entries", removed)))
            }
        }
    }

    fn harness(&self, config: HarnessConfig) -> Harness {
        Harness::new(config, self.cancel.clone())
    }
}
