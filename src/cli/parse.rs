//! CLI parse: clap types for snapverify. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// snapverify - snapshot/restore consistency harness for filesystem services
#[derive(Parser)]
#[command(name = "snapverify")]
#[command(about = "Verify that a filesystem service restores snapshots exactly")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory; relative paths in the config resolve against it
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable logging entirely
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Debug-level logging, mirrored to stderr
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the end-to-end and rename-before-restore scenario
    Verify {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run randomized stress rounds with save/mutate/restore/verify cycles
    Stress {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Fixed RNG seed for the drawn durations, thread counts and rounds
        #[arg(long)]
        seed: Option<u64>,
        /// Ask for confirmation that stress workers exited instead of waiting
        #[arg(long)]
        interactive: bool,
    },
    /// Mount, settle, unmount; exit with the service's exit code
    MountCheck {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Check the service's usage message when run without a mount point
    UsageCheck {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete entries starting with a prefix (defaults to the run's snapshot artifacts)
    Clean {
        /// Name prefix, optionally with a directory part
        #[arg(long)]
        prefix: Option<String>,
        /// Directory to resolve the prefix against (defaults to the artifact directory
        /// without --prefix, the current directory with it)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
