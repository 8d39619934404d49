//! Post-apply check execution.
//!
//! Checks run while the infrastructure is up. A failing check is recorded,
//! never raised, so destroy still runs afterwards.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use harness::core::env::parse_env_vars;
use harness::core::options::TerraformOptions;
use harness::io::process::{ProcessLimits, run_captured};
use harness::io::terraform::Terraform;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::scenario::Check;

/// Collected check outcomes for a run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Judgment {
    pub checks: Vec<CheckOutcome>,
}

impl Judgment {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }
}

/// Result of running a single check.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    OutputNotEmpty {
        name: String,
        passed: bool,
        value: Option<String>,
        error: Option<String>,
    },
    OutputEquals {
        name: String,
        expected: String,
        passed: bool,
        value: Option<String>,
        error: Option<String>,
    },
    CommandSucceeds {
        cmd: Vec<String>,
        passed: bool,
        exit_code: Option<i32>,
        timed_out: bool,
        output: String,
        error: Option<String>,
    },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CheckOutcome::OutputNotEmpty { passed, .. } => *passed,
            CheckOutcome::OutputEquals { passed, .. } => *passed,
            CheckOutcome::CommandSucceeds { passed, .. } => *passed,
        }
    }

    /// Stable label used when aggregating pass rates across runs.
    pub fn label(&self) -> String {
        match self {
            CheckOutcome::OutputNotEmpty { name, .. } => format!("output_not_empty({name})"),
            CheckOutcome::OutputEquals { name, .. } => format!("output_equals({name})"),
            CheckOutcome::CommandSucceeds { cmd, .. } => {
                format!("command_succeeds({})", cmd.join(" "))
            }
        }
    }
}

/// Run all checks in order and collect outcomes.
#[instrument(skip_all, fields(check_count = checks.len()))]
pub fn run_checks(
    checks: &[Check],
    terraform: &Terraform,
    options: &TerraformOptions,
    limits: ProcessLimits,
) -> Judgment {
    let mut outcomes = Vec::with_capacity(checks.len());
    for check in checks {
        let outcome = match check {
            Check::OutputNotEmpty { name } => match terraform.output(options, name) {
                Ok(value) => CheckOutcome::OutputNotEmpty {
                    name: name.clone(),
                    passed: !value.is_empty(),
                    value: Some(value),
                    error: None,
                },
                Err(err) => CheckOutcome::OutputNotEmpty {
                    name: name.clone(),
                    passed: false,
                    value: None,
                    error: Some(format!("{err:#}")),
                },
            },
            Check::OutputEquals { name, value } => match terraform.output(options, name) {
                Ok(actual) => CheckOutcome::OutputEquals {
                    name: name.clone(),
                    expected: value.clone(),
                    passed: &actual == value,
                    value: Some(actual),
                    error: None,
                },
                Err(err) => CheckOutcome::OutputEquals {
                    name: name.clone(),
                    expected: value.clone(),
                    passed: false,
                    value: None,
                    error: Some(format!("{err:#}")),
                },
            },
            Check::CommandSucceeds { cmd } => run_command_check(cmd, options, limits),
        };
        if outcome.passed() {
            debug!(check = %outcome.label(), "check passed");
        } else {
            warn!(check = %outcome.label(), "check failed");
        }
        outcomes.push(outcome);
    }
    Judgment { checks: outcomes }
}

fn run_command_check(
    cmd: &[String],
    options: &TerraformOptions,
    limits: ProcessLimits,
) -> CheckOutcome {
    let failed = |error: String| CheckOutcome::CommandSucceeds {
        cmd: cmd.to_vec(),
        passed: false,
        exit_code: None,
        timed_out: false,
        output: String::new(),
        error: Some(error),
    };

    let Some((program, args)) = cmd.split_first() else {
        return failed("empty command".to_string());
    };
    let env = match parse_env_vars(&options.env_vars) {
        Ok(env) => env,
        Err(err) => return failed(format!("{err:#}")),
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&options.terraform_dir)
        .envs(env);
    match run_captured(command, limits, None) {
        Ok(output) => CheckOutcome::CommandSucceeds {
            cmd: cmd.to_vec(),
            passed: output.succeeded(),
            exit_code: output.status.code(),
            timed_out: output.timed_out,
            output: output.combined(),
            error: None,
        },
        Err(err) => failed(format!("{err:#}")),
    }
}

pub fn write_judgment(path: &Path, judgment: &Judgment) -> Result<()> {
    let contents = serde_json::to_string_pretty(judgment).context("serialize checks")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use harness::test_support::{fake_terraform, terraform_fixture};

    fn limits() -> ProcessLimits {
        ProcessLimits::new(Duration::from_secs(10), 10_000)
    }

    #[test]
    fn output_checks_compare_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let terraform = Terraform::new(fake_terraform(temp.path()).expect("fake"), limits());
        let mut options = terraform_fixture(temp.path(), "k3s").expect("fixture");
        options
            .env_vars
            .push("FAKE_OUTPUT_node_ip=10.0.0.5".to_string());

        let judgment = run_checks(
            &[
                Check::OutputNotEmpty {
                    name: "node_ip".to_string(),
                },
                Check::OutputEquals {
                    name: "node_ip".to_string(),
                    value: "10.0.0.6".to_string(),
                },
                Check::OutputNotEmpty {
                    name: "kubeconfig".to_string(),
                },
            ],
            &terraform,
            &options,
            limits(),
        );

        let passed: Vec<bool> = judgment.checks.iter().map(CheckOutcome::passed).collect();
        assert_eq!(passed, vec![true, false, false]);
        assert!(!judgment.all_passed());
    }

    #[test]
    fn command_check_runs_in_terraform_dir_with_env() {
        let temp = tempfile::tempdir().expect("tempdir");
        let terraform = Terraform::new(fake_terraform(temp.path()).expect("fake"), limits());
        let mut options = terraform_fixture(temp.path(), "talos").expect("fixture");
        options.env_vars.push("CLUSTER=lab".to_string());
        fs::write(options.terraform_dir.join("marker"), "").expect("marker");

        let judgment = run_checks(
            &[
                Check::CommandSucceeds {
                    cmd: vec![
                        "sh".to_string(),
                        "-c".to_string(),
                        "test -f marker && test \"$CLUSTER\" = lab".to_string(),
                    ],
                },
                Check::CommandSucceeds {
                    cmd: vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()],
                },
            ],
            &terraform,
            &options,
            limits(),
        );

        assert!(judgment.checks[0].passed());
        match &judgment.checks[1] {
            CheckOutcome::CommandSucceeds {
                passed, exit_code, ..
            } => {
                assert!(!passed);
                assert_eq!(*exit_code, Some(7));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn labels_are_stable() {
        let outcome = CheckOutcome::CommandSucceeds {
            cmd: vec!["kubectl".to_string(), "get".to_string(), "nodes".to_string()],
            passed: true,
            exit_code: Some(0),
            timed_out: false,
            output: String::new(),
            error: None,
        };
        assert_eq!(outcome.label(), "command_succeeds(kubectl get nodes)");
    }
}
