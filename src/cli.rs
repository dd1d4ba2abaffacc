//! CLI domain: parse, route, help, output, and presentation only.
//! No orchestration here; the route table dispatches to the harness.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, mounts_service};
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_mount_check_text, format_run_report_text, format_section_heading,
    format_usage_check_text, to_json,
};
pub use route::{CommandOutput, RunContext};
