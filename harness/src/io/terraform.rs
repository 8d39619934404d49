//! Terraform executor: init, apply, destroy, and output with retries on
//! known-transient errors.

use std::path::PathBuf;
use std::process::Command;
use std::thread;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, instrument, warn};

use crate::core::args::{apply_args, destroy_args, init_args, output_args};
use crate::core::env::parse_env_vars;
use crate::core::options::TerraformOptions;
use crate::core::retryable::RetryablePatterns;
use crate::io::process::{CommandOutput, ProcessLimits, run_captured};

/// Lines of output kept in error messages.
const ERROR_TAIL_LINES: usize = 20;

/// Runs terraform commands for a set of [`TerraformOptions`].
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: PathBuf,
    limits: ProcessLimits,
    log_path: Option<PathBuf>,
}

impl Terraform {
    pub fn new(binary: impl Into<PathBuf>, limits: ProcessLimits) -> Self {
        Self {
            binary: binary.into(),
            limits,
            log_path: None,
        }
    }

    /// Append the output of every command to `path` as it is produced.
    pub fn with_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// `terraform init`.
    pub fn init(&self, options: &TerraformOptions) -> Result<String> {
        self.run_with_retries(options, &init_args(options), "init")
    }

    /// `terraform apply -auto-approve` with vars and var files.
    pub fn apply(&self, options: &TerraformOptions) -> Result<String> {
        self.run_with_retries(options, &apply_args(options), "apply")
    }

    /// `init` followed by `apply`. Returns both outputs concatenated.
    #[instrument(skip_all, fields(dir = %options.terraform_dir.display()))]
    pub fn init_and_apply(&self, options: &TerraformOptions) -> Result<String> {
        let mut output = self.init(options)?;
        output.push_str(&self.apply(options)?);
        info!("terraform applied");
        Ok(output)
    }

    /// `terraform destroy -auto-approve` with vars and var files.
    #[instrument(skip_all, fields(dir = %options.terraform_dir.display()))]
    pub fn destroy(&self, options: &TerraformOptions) -> Result<String> {
        let output = self.run_with_retries(options, &destroy_args(options), "destroy")?;
        info!("terraform destroyed");
        Ok(output)
    }

    /// Raw value of output `name`, trimmed.
    pub fn output(&self, options: &TerraformOptions, name: &str) -> Result<String> {
        let raw = self.run_with_retries(options, &output_args(options, name), "output")?;
        Ok(raw.trim().to_string())
    }

    /// Arm a guard that runs `destroy` when dropped, including during a panic.
    pub fn destroy_on_drop<'a>(&'a self, options: &'a TerraformOptions) -> DestroyGuard<'a> {
        DestroyGuard {
            terraform: self,
            options,
            armed: true,
        }
    }

    #[instrument(skip_all, fields(action = %action, dir = %options.terraform_dir.display()))]
    fn run_with_retries(
        &self,
        options: &TerraformOptions,
        args: &[String],
        action: &str,
    ) -> Result<String> {
        options
            .validate()
            .with_context(|| format!("terraform {action}: invalid options"))?;
        let patterns = RetryablePatterns::compile(&options.retryable_errors)?;

        let mut attempt = 0u32;
        loop {
            let output = self
                .run_once(options, args)
                .with_context(|| format!("terraform {action}"))?;
            let combined = output.combined();
            if output.succeeded() {
                debug!(attempt, "terraform command succeeded");
                return Ok(combined);
            }

            let Some(reason) = patterns.match_output(&combined) else {
                bail!(
                    "terraform {action} failed ({}):\n{}",
                    output.describe_exit(),
                    tail(&combined)
                );
            };

            if attempt >= options.max_retries {
                bail!(
                    "terraform {action} still failing after {} retries ({reason}):\n{}",
                    options.max_retries,
                    tail(&combined)
                );
            }

            attempt += 1;
            warn!(
                attempt,
                max_retries = options.max_retries,
                reason,
                "terraform command hit a retryable error"
            );
            thread::sleep(options.time_between_retries());
        }
    }

    fn run_once(&self, options: &TerraformOptions, args: &[String]) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(&options.terraform_dir)
            .env("TF_IN_AUTOMATION", "1");
        for (key, value) in parse_env_vars(&options.env_vars)? {
            cmd.env(key, value);
        }
        run_captured(cmd, self.limits, self.log_path.as_deref())
    }
}

/// Runs `terraform destroy` when dropped unless [`DestroyGuard::finish`] was
/// called first.
#[must_use = "dropping the guard immediately destroys the infrastructure"]
pub struct DestroyGuard<'a> {
    terraform: &'a Terraform,
    options: &'a TerraformOptions,
    armed: bool,
}

impl DestroyGuard<'_> {
    /// Destroy now and return the result instead of logging it.
    pub fn finish(mut self) -> Result<String> {
        self.armed = false;
        self.terraform.destroy(self.options)
    }

    /// Leave the infrastructure in place.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DestroyGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.terraform.destroy(self.options) {
            error!(
                err = %format!("{err:#}"),
                dir = %self.options.terraform_dir.display(),
                "terraform destroy failed during cleanup"
            );
        }
    }
}

fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}
