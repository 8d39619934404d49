//! Matching command output against retryable error patterns.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;

/// Transient provider/plugin download failures worth retrying for any
/// configuration.
pub fn default_retryable_errors() -> BTreeMap<String, String> {
    [
        (
            ".*read: connection reset by peer.*",
            "Failed to reach helm charts repository.",
        ),
        (
            ".*unable to verify signature.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*unable to verify checksum.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*no provider exists with the given name.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*registry service is unreachable.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*Error installing provider.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*Failed to query available provider packages.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*timeout while waiting for plugin to start.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            ".*timed out waiting for server handshake.*",
            "Failed to retrieve plugin due to transient network error.",
        ),
        (
            "could not query provider registry for",
            "Failed to retrieve plugin due to transient network error.",
        ),
    ]
    .into_iter()
    .map(|(pattern, description)| (pattern.to_string(), description.to_string()))
    .collect()
}

/// Compiled retryable error patterns, in key order.
#[derive(Debug, Clone)]
pub struct RetryablePatterns {
    patterns: Vec<(Regex, String)>,
}

impl RetryablePatterns {
    pub fn compile(errors: &BTreeMap<String, String>) -> Result<Self> {
        let mut patterns = Vec::with_capacity(errors.len());
        for (pattern, description) in errors {
            let regex = Regex::new(pattern)
                .with_context(|| format!("compile retryable error pattern {pattern:?}"))?;
            patterns.push((regex, description.clone()));
        }
        Ok(Self { patterns })
    }

    /// Description of the first pattern matching `output`, if any.
    pub fn match_output(&self, output: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(output))
            .map(|(_, description)| description.as_str())
    }
}
