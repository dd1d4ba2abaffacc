//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name as typed on the command line (e.g. "mount-check").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Verify { .. } => "verify",
        Commands::Stress { .. } => "stress",
        Commands::MountCheck { .. } => "mount-check",
        Commands::UsageCheck { .. } => "usage-check",
        Commands::Clean { .. } => "clean",
    }
}

/// Whether the command mounts the filesystem service.
pub fn mounts_service(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Verify { .. } | Commands::Stress { .. } | Commands::MountCheck { .. }
    )
}
