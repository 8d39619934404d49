//! Tool smoke checks: run an external binary and judge its output.

use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::types::{ToolCheck, Verdict};
use crate::io::process::{ProcessLimits, run_captured};

/// Outcome of one tool check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReport {
    pub name: String,
    pub command: Vec<String>,
    pub verdict: Verdict,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Combined stdout and stderr.
    pub output: String,
}

/// Run one check. Never fails: problems become a `Fatal` verdict.
#[instrument(skip_all, fields(tool = %check.name))]
pub fn run_tool_check(check: &ToolCheck, limits: ProcessLimits) -> ToolReport {
    let mut report = ToolReport {
        name: check.name.clone(),
        command: check.command.clone(),
        verdict: Verdict::Pass,
        exit_code: None,
        timed_out: false,
        output: String::new(),
    };

    let Some((program, args)) = check.command.split_first() else {
        report.verdict = Verdict::Fatal(format!("{} has no command configured", check.name));
        return report;
    };

    let mut cmd = Command::new(program);
    cmd.args(args);
    let output = match run_captured(cmd, limits, None) {
        Ok(output) => output,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "tool did not run");
            report.verdict = Verdict::Fatal(format!("failed to run {}: {err:#}", check.name));
            return report;
        }
    };

    report.exit_code = output.status.code();
    report.timed_out = output.timed_out;
    report.output = output.combined();

    report.verdict = if !output.succeeded() {
        Verdict::Fatal(format!(
            "failed to run {}: {}",
            check.name,
            output.describe_exit()
        ))
    } else {
        match check.expect.evaluate(&check.name, &report.output) {
            Ok(()) => Verdict::Pass,
            Err(message) => Verdict::Error(message),
        }
    };

    info!(verdict = report.verdict.label(), "tool check finished");
    report
}

/// Run every check in order. A failing check does not stop the rest.
pub fn run_tool_checks(checks: &[ToolCheck], limits: ProcessLimits) -> Vec<ToolReport> {
    checks
        .iter()
        .map(|check| run_tool_check(check, limits))
        .collect()
}
