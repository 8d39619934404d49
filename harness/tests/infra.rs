//! Smoke tests against the real infrastructure tools.
//!
//! Ignored by default: they need `terraform`, `gpg`, `talosctl`, and `flux`
//! on `PATH` (and a reachable cluster for the latter two).
//!
//! Run with:
//!
//! ```bash
//! cargo test -p harness --test infra -- --ignored
//! ```

use std::time::Duration;

use harness::core::types::{Verdict, default_tool_checks};
use harness::io::process::ProcessLimits;
use harness::io::tools::{ToolReport, run_tool_check};

fn run_default(name: &str) -> ToolReport {
    let check = default_tool_checks()
        .into_iter()
        .find(|check| check.name == name)
        .unwrap_or_else(|| panic!("no default check named {name}"));
    run_tool_check(
        &check,
        ProcessLimits::new(Duration::from_secs(60), 1_000_000),
    )
}

fn assert_passes(report: &ToolReport) {
    assert_eq!(
        report.verdict,
        Verdict::Pass,
        "{} output:\n{}",
        report.name,
        report.output
    );
}

#[test]
#[ignore]
fn terraform_is_installed() {
    assert_passes(&run_default("terraform"));
}

#[test]
#[ignore]
fn gpg_has_keys() {
    assert_passes(&run_default("gpg"));
}

#[test]
#[ignore]
fn talosctl_reports_version() {
    assert_passes(&run_default("talosctl"));
}

#[test]
#[ignore]
fn flux_reports_version() {
    assert_passes(&run_default("flux"));
}
