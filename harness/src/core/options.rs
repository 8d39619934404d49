//! Options describing one terraform configuration to apply and destroy.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::env::parse_env_vars;
use crate::core::retryable::{RetryablePatterns, default_retryable_errors};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIME_BETWEEN_RETRIES_SECS: u64 = 5;

/// Everything needed to run `terraform` against one configuration.
///
/// Values live for a single smoke run; nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerraformOptions {
    /// Directory containing the configuration. Commands run from here, so
    /// relative `var_files` resolve against it.
    pub terraform_dir: PathBuf,

    /// Passed as `-var key=value`, rendered as HCL.
    pub vars: BTreeMap<String, Value>,

    /// Passed as `-var-file path`.
    pub var_files: Vec<PathBuf>,

    /// `KEY=VALUE` entries added to the child environment.
    pub env_vars: Vec<String>,

    /// Regex → description. A failed command whose output matches is retried.
    pub retryable_errors: BTreeMap<String, String>,

    pub max_retries: u32,

    pub time_between_retries_secs: u64,

    /// Add `-no-color` to every command.
    pub no_color: bool,
}

impl Default for TerraformOptions {
    fn default() -> Self {
        Self {
            terraform_dir: PathBuf::new(),
            vars: BTreeMap::new(),
            var_files: Vec::new(),
            env_vars: Vec::new(),
            retryable_errors: BTreeMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            time_between_retries_secs: DEFAULT_TIME_BETWEEN_RETRIES_SECS,
            no_color: false,
        }
    }
}

impl TerraformOptions {
    pub fn new(terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            terraform_dir: terraform_dir.into(),
            ..Self::default()
        }
    }

    /// Merge the default transient-error patterns. Patterns already present
    /// keep their description.
    pub fn with_default_retryable_errors(mut self) -> Self {
        for (pattern, description) in default_retryable_errors() {
            self.retryable_errors.entry(pattern).or_insert(description);
        }
        self
    }

    pub fn time_between_retries(&self) -> Duration {
        Duration::from_secs(self.time_between_retries_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.terraform_dir.as_os_str().is_empty() {
            bail!("terraform_dir must be non-empty");
        }
        for (index, path) in self.var_files.iter().enumerate() {
            if path.as_os_str().is_empty() {
                bail!("var_files[{index}] must be non-empty");
            }
        }
        for key in self.vars.keys() {
            if key.trim().is_empty() {
                bail!("vars keys must be non-empty");
            }
        }
        parse_env_vars(&self.env_vars).context("env_vars invalid")?;
        RetryablePatterns::compile(&self.retryable_errors).context("retryable_errors invalid")?;
        Ok(())
    }
}
