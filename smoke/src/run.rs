//! Scenario execution: init + apply, checks, destroy, result capture.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use harness::io::config::HarnessConfig;
use harness::io::terraform::Terraform;
use tracing::{debug, error, info, instrument, warn};

use crate::checks::{Judgment, run_checks, write_judgment};
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{RunMeta, file_sha256, run_dir, write_meta};
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip destroy and leave the infrastructure running.
    pub keep: bool,
}

/// Result of running a single scenario.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub results_dir: PathBuf,
    pub outcome: Outcome,
}

/// Run a scenario end-to-end.
///
/// Destroy runs whether or not apply succeeded (unless `keep` is set), so a
/// partial apply is still cleaned up. Apply, check, and destroy failures are
/// recorded in the outcome rather than returned as errors; `Err` means the
/// harness itself could not run or record the scenario.
#[instrument(skip_all, fields(scenario_id = %scenario.id()))]
pub fn run_scenario(
    root: &Path,
    config: &HarnessConfig,
    scenario: &Scenario,
    run_options: RunOptions,
) -> Result<RunOutcome> {
    info!("scenario run started");
    let options = scenario.options();

    let started_at = Utc::now();
    let run_id = format!("run-{}", started_at.format("%Y%m%d_%H%M%S_%3f"));
    let results_dir = run_dir(&root.join(&config.results_dir), scenario.id(), &run_id);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;

    let terraform_binary = resolve_binary(root, &config.terraform_binary);
    let terraform = Terraform::new(&terraform_binary, config.terraform_limits())
        .with_log(results_dir.join("terraform.log"));

    let guard = terraform.destroy_on_drop(&options);

    debug!("running terraform init and apply");
    let apply_error = match terraform.init_and_apply(&options) {
        Ok(_) => None,
        Err(err) => {
            error!(err = %format!("{err:#}"), "terraform apply failed");
            Some(format!("{err:#}"))
        }
    };

    let judgment = if apply_error.is_none() {
        debug!("running checks");
        run_checks(
            &scenario.file.checks,
            &terraform,
            &options,
            config.terraform_limits(),
        )
    } else {
        Judgment::default()
    };

    let (destroy_error, destroyed) = if run_options.keep {
        warn!(dir = %options.terraform_dir.display(), "keeping infrastructure, destroy skipped");
        guard.disarm();
        (None, false)
    } else {
        debug!("running terraform destroy");
        match guard.finish() {
            Ok(_) => (None, true),
            Err(err) => {
                error!(err = %format!("{err:#}"), "terraform destroy failed");
                (Some(format!("{err:#}")), false)
            }
        }
    };
    let finished_at = Utc::now();

    let outcome = classify_outcome(apply_error.is_some(), destroy_error.is_some(), &judgment);

    let mut errors = Vec::new();
    let scenario_hash = match file_sha256(&scenario.path) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("scenario hash: {err:#}"));
            String::new()
        }
    };

    let duration = finished_at - started_at;
    let meta = RunMeta {
        scenario_id: scenario.id().to_string(),
        run_id: run_id.clone(),
        scenario_hash,
        terraform_dir: options.terraform_dir.display().to_string(),
        terraform_binary: terraform_binary.display().to_string(),
        outcome,
        apply_error,
        destroy_error,
        destroyed,
        start_time: started_at.to_rfc3339(),
        end_time: finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        errors,
    };
    write_meta(&results_dir.join("meta.json"), &meta)?;
    write_judgment(&results_dir.join("checks.json"), &judgment)?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "scenario run complete");
    Ok(RunOutcome {
        run_id,
        results_dir,
        outcome,
    })
}

/// Relative paths with a directory component are taken from `root`; bare
/// names are looked up on `PATH`.
pub fn resolve_binary(root: &Path, binary: &Path) -> PathBuf {
    if binary.is_relative() && binary.components().count() > 1 {
        root.join(binary)
    } else {
        binary.to_path_buf()
    }
}
