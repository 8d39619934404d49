//! Scenario file parsing and validation.
//!
//! A scenario is a TOML file naming one terraform configuration to apply and
//! destroy, plus optional checks to run while it is up. See `scenarios/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use harness::core::options::TerraformOptions;
use serde::Deserialize;
use serde_json::Value;

/// A parsed scenario file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioFile {
    pub scenario: ScenarioMeta,
    pub terraform: TerraformSection,
    #[serde(default)]
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScenarioMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    #[serde(default)]
    pub description: String,
}

/// The `[terraform]` table. Maps onto [`TerraformOptions`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerraformSection {
    /// Configuration directory, relative to the scenario file.
    pub dir: PathBuf,
    pub vars: BTreeMap<String, Value>,
    /// Relative to `dir`, since terraform runs from there.
    pub var_files: Vec<PathBuf>,
    pub env_vars: Vec<String>,
    pub retryable_errors: BTreeMap<String, String>,
    /// Merge the built-in transient provider errors into `retryable_errors`.
    pub default_retryable_errors: bool,
    pub max_retries: Option<u32>,
    pub time_between_retries_secs: Option<u64>,
    pub no_color: bool,
}

/// Check run after a successful apply, before destroy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// `terraform output -raw <name>` is non-empty.
    OutputNotEmpty { name: String },
    /// `terraform output -raw <name>` equals `value`.
    OutputEquals { name: String, value: String },
    /// Command exits 0 when run from the terraform directory.
    CommandSucceeds { cmd: Vec<String> },
}

/// A scenario together with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub path: PathBuf,
    pub file: ScenarioFile,
}

impl ScenarioFile {
    /// Load and validate a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read scenario {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load scenario {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let file: ScenarioFile = toml::from_str(contents).context("parse scenario")?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        validate_scenario_id(&self.scenario.id)?;
        if self.terraform.dir.as_os_str().is_empty() {
            bail!("terraform.dir must be non-empty");
        }
        for (index, check) in self.checks.iter().enumerate() {
            check
                .validate()
                .with_context(|| format!("checks[{index}] invalid"))?;
        }
        self.options(Path::new("."))
            .validate()
            .context("terraform section invalid")?;
        Ok(())
    }

    /// Build terraform options, resolving `terraform.dir` against `base_dir`.
    pub fn options(&self, base_dir: &Path) -> TerraformOptions {
        let section = &self.terraform;
        let mut options = TerraformOptions::new(base_dir.join(&section.dir));
        options.vars = section.vars.clone();
        options.var_files = section.var_files.clone();
        options.env_vars = section.env_vars.clone();
        options.retryable_errors = section.retryable_errors.clone();
        options.no_color = section.no_color;
        if let Some(max_retries) = section.max_retries {
            options.max_retries = max_retries;
        }
        if let Some(secs) = section.time_between_retries_secs {
            options.time_between_retries_secs = secs;
        }
        if section.default_retryable_errors {
            options = options.with_default_retryable_errors();
        }
        options
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: ScenarioFile::load(path)?,
        })
    }

    pub fn id(&self) -> &str {
        &self.file.scenario.id
    }

    /// Terraform options with paths resolved against the scenario's directory.
    pub fn options(&self) -> TerraformOptions {
        let base_dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        self.file.options(base_dir)
    }
}

impl Check {
    fn validate(&self) -> Result<()> {
        match self {
            Check::OutputNotEmpty { name } | Check::OutputEquals { name, .. } => {
                if name.trim().is_empty() {
                    bail!("output name must be non-empty");
                }
            }
            Check::CommandSucceeds { cmd } => {
                if cmd.is_empty() || cmd[0].trim().is_empty() {
                    bail!("command_succeeds.cmd must be a non-empty array");
                }
            }
        }
        Ok(())
    }
}

/// Discover and load all scenario files in `dir`, sorted by id.
///
/// Errors on duplicate ids.
pub fn discover_scenarios(dir: &Path) -> Result<Vec<Scenario>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut scenarios = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("read scenarios dir {}", dir.display()))?
    {
        let entry = entry.context("read scenario entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        scenarios.push(Scenario::load(&path)?);
    }
    scenarios.sort_by(|left, right| left.id().cmp(right.id()));
    for pair in scenarios.windows(2) {
        if pair[0].id() == pair[1].id() {
            return Err(anyhow!(
                "duplicate scenario.id {} ({} and {})",
                pair[0].id(),
                pair[0].path.display(),
                pair[1].path.display()
            ));
        }
    }
    Ok(scenarios)
}

/// Find a scenario by id.
pub fn find_scenario(dir: &Path, id: &str) -> Result<Scenario> {
    discover_scenarios(dir)?
        .into_iter()
        .find(|scenario| scenario.id() == id)
        .ok_or_else(|| anyhow!("scenario {} not found in {}", id, dir.display()))
}

/// Ids must be slugs, so they are safe to use as a single path component.
pub fn validate_scenario_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("scenario.id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("scenario.id must use [a-z0-9_-] only");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FULL: &str = r#"
[scenario]
id = "proxmox-k3s"
description = "k3s on proxmox"

[terraform]
dir = "../infra/proxmox_k3s"
var_files = ["variables.tfvars"]
env_vars = ["TF_LOG=WARN"]
default_retryable_errors = true
max_retries = 2
time_between_retries_secs = 1

[terraform.vars]
node_count = 3

[terraform.retryable_errors]
"(?i)connection reset" = "transient network error"

[[checks]]
type = "output_not_empty"
name = "kubeconfig"

[[checks]]
type = "command_succeeds"
cmd = ["kubectl", "get", "nodes"]
"#;

    #[test]
    fn parses_full_scenario() {
        let file = ScenarioFile::parse_str(FULL).expect("scenario parses");
        assert_eq!(file.scenario.id, "proxmox-k3s");
        assert_eq!(file.checks.len(), 2);

        let options = file.options(Path::new("/repo/scenarios"));
        assert_eq!(
            options.terraform_dir,
            PathBuf::from("/repo/scenarios/../infra/proxmox_k3s")
        );
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.time_between_retries(), Duration::from_secs(1));
        assert_eq!(options.vars["node_count"], serde_json::json!(3));
        assert!(options.retryable_errors.contains_key("(?i)connection reset"));
        assert!(options.retryable_errors.len() > 1);
    }

    #[test]
    fn minimal_scenario_uses_defaults() {
        let file = ScenarioFile::parse_str(
            r#"
[scenario]
id = "terraform"

[terraform]
dir = "../terraform"
"#,
        )
        .expect("scenario parses");
        assert!(file.checks.is_empty());
        let options = file.options(Path::new("."));
        assert!(options.retryable_errors.is_empty());
        assert_eq!(options.max_retries, harness::core::options::DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn rejects_invalid_id() {
        let err = ScenarioFile::parse_str(
            r#"
[scenario]
id = "Talos/Setup"

[terraform]
dir = "talos"
"#,
        )
        .expect_err("invalid id");
        assert!(err.to_string().contains("scenario.id"));
    }

    #[test]
    fn rejects_bad_retryable_pattern() {
        let err = ScenarioFile::parse_str(
            r#"
[scenario]
id = "talos"

[terraform]
dir = "talos"

[terraform.retryable_errors]
"(broken" = "never compiles"
"#,
        )
        .expect_err("invalid regex");
        assert!(format!("{err:#}").contains("retryable_errors"));
    }

    #[test]
    fn rejects_empty_command_check() {
        let err = ScenarioFile::parse_str(
            r#"
[scenario]
id = "talos"

[terraform]
dir = "talos"

[[checks]]
type = "command_succeeds"
cmd = []
"#,
        )
        .expect_err("empty cmd");
        assert!(format!("{err:#}").contains("checks[0]"));
    }

    #[test]
    fn discover_sorts_and_rejects_duplicates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let write = |name: &str, id: &str| {
            fs::write(
                temp.path().join(name),
                format!("[scenario]\nid = \"{id}\"\n\n[terraform]\ndir = \"infra\"\n"),
            )
            .expect("write scenario");
        };
        write("b.toml", "talos");
        write("a.toml", "k3s-node");
        fs::write(temp.path().join("README.md"), "not a scenario").expect("readme");

        let ids: Vec<String> = discover_scenarios(temp.path())
            .expect("discover")
            .iter()
            .map(|scenario| scenario.id().to_string())
            .collect();
        assert_eq!(ids, vec!["k3s-node", "talos"]);

        write("c.toml", "talos");
        let err = discover_scenarios(temp.path()).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate scenario.id talos"));
    }

    #[test]
    fn scenario_options_resolve_against_file_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("talos.toml");
        fs::write(
            &path,
            "[scenario]\nid = \"talos\"\n\n[terraform]\ndir = \"../talos\"\n",
        )
        .expect("write");
        let scenario = Scenario::load(&path).expect("load");
        assert_eq!(scenario.options().terraform_dir, temp.path().join("../talos"));
    }
}
