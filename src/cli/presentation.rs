//! CLI presentation: text and json formatters for run reports.

use crate::error::HarnessError;
use crate::report::{MountCheckReport, RunReport, UsageCheckReport};
use crate::types::VerificationOutcome;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Pretty JSON for any report.
pub fn to_json<T: Serialize>(report: &T) -> Result<String, HarnessError> {
    serde_json::to_string_pretty(report)
        .map_err(|e| HarnessError::Config(format!("Failed to serialize report: {}", e)))
}

fn outcome_label(outcome: &VerificationOutcome) -> String {
    match outcome {
        VerificationOutcome::Pass { .. } => format!("{}", "PASS".green()),
        VerificationOutcome::Mismatch { .. } => format!("{}", "MISMATCH".red()),
        VerificationOutcome::OracleTransient { .. } => format!("{}", "TRANSIENT".yellow()),
        VerificationOutcome::ProcessFailure { .. } => format!("{}", "FAILURE".red()),
    }
}

fn outcome_detail(outcome: &VerificationOutcome) -> (String, String) {
    match outcome {
        VerificationOutcome::Pass { index, signature } => {
            (index.to_string(), signature.to_string())
        }
        VerificationOutcome::Mismatch {
            index,
            expected,
            actual,
        } => (index.to_string(), format!("{} -> {}", expected, actual)),
        VerificationOutcome::OracleTransient { diagnostic } => ("-".to_string(), diagnostic.clone()),
        VerificationOutcome::ProcessFailure { message } => ("-".to_string(), message.clone()),
    }
}

/// Format a `verify`/`stress` report as tables.
pub fn format_run_report_text(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("snapverify {}", report.command))
    ));
    out.push_str(&format!("  Mount path: {}\n", report.mount_path.display()));
    out.push_str(&format!("  Backend: {:?}\n", report.backend));
    out.push_str(&format!(
        "  Duration: {:.1}s\n\n",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    ));

    out.push_str(&format!("{}\n\n", format_section_heading("Snapshots")));
    if report.records.is_empty() {
        out.push_str("  None saved\n\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Index", "Artifact", "Signature"]);
        for record in &report.records {
            table.add_row(vec![
                record.index.to_string(),
                record.artifact.clone(),
                record.signature.to_string(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    out.push_str(&format!("{}\n\n", format_section_heading("Verifications")));
    if report.outcomes.is_empty() {
        out.push_str("  None run\n\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Result", "Index", "Detail"]);
        for outcome in &report.outcomes {
            let (index, detail) = outcome_detail(outcome);
            table.add_row(vec![outcome_label(outcome), index, detail]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    if let Some(cleanup) = &report.cleanup {
        out.push_str(&format!("{}\n\n", format_section_heading("Cleanup")));
        out.push_str(&format!(
            "  Stress jobs terminated: {}\n",
            cleanup.jobs_terminated
        ));
        out.push_str(&format!(
            "  Service exit code: {}\n",
            cleanup
                .service_exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none (signaled)".to_string())
        ));
        out.push_str(&format!(
            "  Artifacts removed: {}\n",
            cleanup.artifacts_removed
        ));
        for failure in &cleanup.failures {
            out.push_str(&format!("  {} {}\n", "!".red(), failure));
        }
        out.push('\n');
    }

    if report.passed() {
        out.push_str(&format!("{}", "All verifications passed".green()));
    } else {
        out.push_str(&format!("{}", "Run failed".red().bold()));
    }
    out
}

pub fn format_mount_check_text(report: &MountCheckReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Mount check")));
    out.push_str(&format!("  Executable: {}\n", report.executable.display()));
    out.push_str(&format!("  Mount path: {}\n", report.mount_path.display()));
    if let Some(err) = &report.error {
        out.push_str(&format!("  Error: {}\n", err));
    }
    out.push_str(&format!("  Exit code: {}", report.exit_code));
    out
}

pub fn format_usage_check_text(report: &UsageCheckReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Usage check")));
    out.push_str(&format!("  Executable: {}\n", report.executable.display()));
    out.push_str(&format!("  Expected stderr: {}\n", report.expected_stderr));
    if report.passed() {
        out.push_str(&format!("  {}", "Usage contract holds".green()));
        return out;
    }
    out.push_str(&format!("\n  Violations ({}):", report.violations.len()));
    for violation in &report.violations {
        out.push_str(&format!("\n  - {}", violation));
    }
    out
}
