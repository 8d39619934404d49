use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::checks::Judgment;
use crate::outcome::Outcome;
use crate::results::read_meta;

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub success: usize,
    pub check_failed: usize,
    pub apply_failed: usize,
    pub destroy_failed: usize,
    /// Runs that left infrastructure behind (destroy failed or skipped).
    pub not_destroyed: usize,
    pub avg_duration_secs: Option<f64>,
    pub check_pass_rates: BTreeMap<String, (usize, usize)>,
}

pub fn load_run_dirs(scenario_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !scenario_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(scenario_results_dir)
        .with_context(|| format!("read {}", scenario_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Summarize every run under `scenario_results_dir`.
///
/// Runs with unreadable `meta.json` are skipped with a warning. A missing
/// `checks.json` counts as no checks.
pub fn aggregate(scenario_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    let mut total_duration = 0.0;

    for run_dir in load_run_dirs(scenario_results_dir)? {
        let meta = match read_meta(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: meta.json invalid ({err:#})",
                    run_dir.display()
                ));
                continue;
            }
        };

        let checks_path = run_dir.join("checks.json");
        let judgment: Judgment = if checks_path.exists() {
            match fs::read_to_string(&checks_path)
                .with_context(|| format!("read {}", checks_path.display()))
                .and_then(|contents| serde_json::from_str(&contents).context("parse checks"))
            {
                Ok(judgment) => judgment,
                Err(err) => {
                    warnings.push(format!(
                        "skip {}: checks.json invalid ({err:#})",
                        run_dir.display()
                    ));
                    continue;
                }
            }
        } else {
            Judgment::default()
        };

        summary.runs += 1;
        match meta.outcome {
            Outcome::Success => summary.success += 1,
            Outcome::CheckFailed => summary.check_failed += 1,
            Outcome::ApplyFailed => summary.apply_failed += 1,
            Outcome::DestroyFailed => summary.destroy_failed += 1,
        }
        if !meta.destroyed {
            summary.not_destroyed += 1;
        }
        total_duration += meta.duration_secs;

        for check in &judgment.checks {
            let entry = summary.check_pass_rates.entry(check.label()).or_insert((0, 0));
            if check.passed() {
                entry.0 += 1;
            }
            entry.1 += 1;
        }
    }

    if summary.runs > 0 {
        summary.avg_duration_secs = Some(total_duration / summary.runs as f64);
    }
    Ok((summary, warnings))
}
