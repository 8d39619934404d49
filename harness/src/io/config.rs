//! Harness configuration stored in `smoke.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{ToolCheck, default_tool_checks};
use crate::io::process::ProcessLimits;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "smoke.toml";

/// Harness configuration (TOML).
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Program used for every terraform command (name on `PATH` or a path).
    pub terraform_binary: PathBuf,

    /// Per-command timeout for tool checks.
    pub tool_timeout_secs: u64,

    /// Per-command timeout for terraform init/apply/destroy/output.
    pub terraform_timeout_secs: u64,

    /// Bytes of stdout/stderr kept per command.
    pub output_limit_bytes: usize,

    /// Directory holding scenario `*.toml` files, relative to the working directory.
    pub scenarios_dir: PathBuf,

    /// Directory receiving per-run results, relative to the working directory.
    pub results_dir: PathBuf,

    pub tools: Vec<ToolCheck>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            terraform_binary: PathBuf::from("terraform"),
            tool_timeout_secs: 60,
            terraform_timeout_secs: 60 * 60,
            output_limit_bytes: 1_000_000,
            scenarios_dir: PathBuf::from("scenarios"),
            results_dir: PathBuf::from(".smoke/results"),
            tools: default_tool_checks(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.terraform_binary.as_os_str().is_empty() {
            return Err(anyhow!("terraform_binary must be non-empty"));
        }
        if self.tool_timeout_secs == 0 {
            return Err(anyhow!("tool_timeout_secs must be > 0"));
        }
        if self.terraform_timeout_secs == 0 {
            return Err(anyhow!("terraform_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (index, tool) in self.tools.iter().enumerate() {
            tool.validate()
                .with_context(|| format!("tools[{index}] invalid"))?;
        }
        Ok(())
    }

    pub fn tool_limits(&self) -> ProcessLimits {
        ProcessLimits::new(
            Duration::from_secs(self.tool_timeout_secs),
            self.output_limit_bytes,
        )
    }

    pub fn terraform_limits(&self) -> ProcessLimits {
        ProcessLimits::new(
            Duration::from_secs(self.terraform_timeout_secs),
            self.output_limit_bytes,
        )
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OutputExpectation;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
        assert_eq!(cfg.tools.len(), 4);
    }

    #[test]
    fn tools_override_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("smoke.toml");
        fs::write(
            &path,
            r#"
tool_timeout_secs = 5

[[tools]]
name = "sops"
command = ["sops", "--version"]
expect = { type = "contains", substring = "sops" }
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.tool_timeout_secs, 5);
        assert_eq!(cfg.tools.len(), 1);
        assert_eq!(
            cfg.tools[0].expect,
            OutputExpectation::Contains {
                substring: "sops".to_string()
            }
        );
        assert_eq!(cfg.terraform_binary, PathBuf::from("terraform"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("smoke.toml");
        fs::write(&path, "terraform_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).expect_err("zero timeout");
        assert!(format!("{err:#}").contains("terraform_timeout_secs"));
    }
}
