//! CLI command implementations.
//!
//! Commands print one `<command>: key=value ...` line per result to stdout
//! and return the process exit code.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use harness::exit_codes;
use harness::io::config::HarnessConfig;
use harness::io::terraform::Terraform;
use harness::io::tools::run_tool_checks;
use tracing::info;

use crate::outcome::combined_exit_code;
use crate::report::aggregate;
use crate::run::{RunOptions, resolve_binary, run_scenario};
use crate::scenario::{discover_scenarios, find_scenario, validate_scenario_id};

/// Run every configured tool check.
pub fn check_tools(config: &HarnessConfig) -> Result<i32> {
    let reports = run_tool_checks(&config.tools, config.tool_limits());
    for report in &reports {
        match report.verdict.message() {
            Some(message) => println!(
                "tool: name={} verdict={} message={:?}",
                report.name,
                report.verdict.label(),
                message
            ),
            None => println!(
                "tool: name={} verdict={}",
                report.name,
                report.verdict.label()
            ),
        }
    }

    let code = if reports.iter().any(|report| report.verdict.is_fatal()) {
        exit_codes::FAILED
    } else if reports.iter().all(|report| report.verdict.is_pass()) {
        exit_codes::OK
    } else {
        exit_codes::ERRORED
    };
    Ok(code)
}

/// List all scenario ids.
pub fn list_scenarios(root: &Path, config: &HarnessConfig) -> Result<i32> {
    for scenario in discover_scenarios(&root.join(&config.scenarios_dir))? {
        if scenario.file.scenario.description.is_empty() {
            println!("{}", scenario.id());
        } else {
            println!("{}\t{}", scenario.id(), scenario.file.scenario.description);
        }
    }
    Ok(exit_codes::OK)
}

/// Run one scenario by id, or all of them when `scenario_id` is `None`.
pub fn run_scenarios(
    root: &Path,
    config: &HarnessConfig,
    scenario_id: Option<&str>,
    run_options: RunOptions,
) -> Result<i32> {
    let scenarios_dir = root.join(&config.scenarios_dir);
    let scenarios = match scenario_id {
        Some(id) => vec![find_scenario(&scenarios_dir, id)?],
        None => discover_scenarios(&scenarios_dir)?,
    };
    if scenarios.is_empty() {
        bail!("no scenarios found in {}", scenarios_dir.display());
    }

    info!(count = scenarios.len(), "starting scenario runs");
    let mut outcomes = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        let outcome = run_scenario(root, config, scenario, run_options)
            .with_context(|| format!("run scenario {}", scenario.id()))?;
        println!(
            "run: scenario={} run_id={} outcome={:?} results={}",
            scenario.id(),
            outcome.run_id,
            outcome.outcome,
            outcome.results_dir.display()
        );
        outcomes.push(outcome.outcome);
    }
    Ok(combined_exit_code(&outcomes))
}

/// Destroy a scenario's infrastructure without applying first.
pub fn destroy_scenario(root: &Path, config: &HarnessConfig, scenario_id: &str) -> Result<i32> {
    let scenario = find_scenario(&root.join(&config.scenarios_dir), scenario_id)?;
    let terraform = Terraform::new(
        resolve_binary(root, &config.terraform_binary),
        config.terraform_limits(),
    );
    match terraform.destroy(&scenario.options()) {
        Ok(_) => {
            println!("destroy: scenario={scenario_id} outcome=destroyed");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            println!("destroy: scenario={scenario_id} outcome=failed");
            eprintln!("{err:#}");
            Ok(exit_codes::FAILED)
        }
    }
}

/// Show aggregated results for a scenario.
pub fn report_scenario(root: &Path, config: &HarnessConfig, scenario_id: &str) -> Result<i32> {
    let results_dir = scenario_results_dir(root, config, scenario_id)?;
    let (summary, warnings) = aggregate(&results_dir)?;
    println!("report: scenario={} runs={}", scenario_id, summary.runs);
    println!(
        "report: success={} check_failed={} apply_failed={} destroy_failed={} not_destroyed={}",
        summary.success,
        summary.check_failed,
        summary.apply_failed,
        summary.destroy_failed,
        summary.not_destroyed
    );
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={:.2}", avg);
    }
    for (label, (passed, total)) in summary.check_pass_rates {
        println!("report: check {} {}/{}", label, passed, total);
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(exit_codes::OK)
}

/// Remove persisted results for a scenario.
pub fn clean_scenario(root: &Path, config: &HarnessConfig, scenario_id: &str) -> Result<i32> {
    let results_dir = scenario_results_dir(root, config, scenario_id)?;
    if results_dir.exists() {
        fs::remove_dir_all(&results_dir)
            .with_context(|| format!("remove {}", results_dir.display()))?;
    }
    println!(
        "clean: scenario={} results={}",
        scenario_id,
        results_dir.display()
    );
    Ok(exit_codes::OK)
}

fn scenario_results_dir(root: &Path, config: &HarnessConfig, scenario_id: &str) -> Result<PathBuf> {
    validate_scenario_id(scenario_id)
        .with_context(|| format!("invalid scenario id {scenario_id:?}"))?;
    Ok(root.join(&config.results_dir).join(scenario_id))
}
