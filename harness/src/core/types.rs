//! Shared types for tool checks and their verdicts.

use serde::{Deserialize, Serialize};

/// Terraform version the tool check expects. `"latest"` accepts any release.
pub const TERRAFORM_VERSION: &str = "latest";

/// Result of a single smoke check.
///
/// `Fatal` means the tool could not do its job at all (spawn failure,
/// timeout, non-zero exit). `Error` means it ran but the output was not what
/// we expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "message", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Error(String),
    Fatal(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Verdict::Fatal(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Error(_) => "error",
            Verdict::Fatal(_) => "fatal",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Error(message) | Verdict::Fatal(message) => Some(message),
        }
    }
}

/// What a tool's combined stdout/stderr must look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputExpectation {
    /// At least one byte of output.
    NonEmpty,
    /// Output contains `substring` verbatim.
    Contains { substring: String },
}

impl OutputExpectation {
    /// Check `output` against the expectation, returning a description of the
    /// mismatch on failure.
    pub fn evaluate(&self, tool: &str, output: &str) -> Result<(), String> {
        match self {
            OutputExpectation::NonEmpty => {
                if output.is_empty() {
                    Err(format!("{tool} produced no output"))
                } else {
                    Ok(())
                }
            }
            OutputExpectation::Contains { substring } => {
                if output.contains(substring.as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "expected {tool} output to contain {substring:?}, got {:?}",
                        output.trim()
                    ))
                }
            }
        }
    }
}

/// One external binary to smoke-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCheck {
    /// Short label used in output and reports.
    pub name: String,
    /// Program and arguments.
    pub command: Vec<String>,
    pub expect: OutputExpectation,
}

impl ToolCheck {
    pub fn new(name: &str, command: &[&str], expect: OutputExpectation) -> Self {
        Self {
            name: name.to_string(),
            command: command.iter().map(|arg| arg.to_string()).collect(),
            expect,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("tool name must be non-empty");
        }
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            anyhow::bail!("tool {} command must be a non-empty array", self.name);
        }
        if let OutputExpectation::Contains { substring } = &self.expect
            && substring.is_empty()
        {
            anyhow::bail!("tool {} expect.substring must be non-empty", self.name);
        }
        Ok(())
    }
}

/// Substring `terraform version` must print for the requested version.
pub fn terraform_version_marker(version: &str) -> String {
    let version = version.trim();
    if version.is_empty() || version == "latest" {
        "Terraform v".to_string()
    } else {
        format!("Terraform v{}", version.trim_start_matches('v'))
    }
}

/// The default tool checks: terraform, gpg, talosctl, and flux.
pub fn default_tool_checks() -> Vec<ToolCheck> {
    vec![
        ToolCheck::new(
            "terraform",
            &["terraform", "version"],
            OutputExpectation::Contains {
                substring: terraform_version_marker(TERRAFORM_VERSION),
            },
        ),
        ToolCheck::new("gpg", &["gpg", "--list-keys"], OutputExpectation::NonEmpty),
        ToolCheck::new(
            "talosctl",
            &["talosctl", "version"],
            OutputExpectation::NonEmpty,
        ),
        ToolCheck::new("flux", &["flux", "version"], OutputExpectation::NonEmpty),
    ]
}
