//! Result persistence.
//!
//! Each run writes `meta.json`, `checks.json`, and `terraform.log` under
//! `<results_dir>/<scenario-id>/<run-id>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::outcome::Outcome;

/// Metadata for a scenario run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunMeta {
    pub scenario_id: String,
    pub run_id: String,
    /// SHA-256 of the scenario file, to tell runs of different revisions apart.
    pub scenario_hash: String,
    pub terraform_dir: String,
    pub terraform_binary: String,
    pub outcome: Outcome,
    pub apply_error: Option<String>,
    pub destroy_error: Option<String>,
    /// False when destroy failed or was skipped with `--keep`.
    pub destroyed: bool,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    /// Non-fatal problems while recording the run.
    pub errors: Vec<String>,
}

pub fn run_dir(base_dir: &Path, scenario_id: &str, run_id: &str) -> PathBuf {
    base_dir.join(scenario_id).join(run_id)
}

pub fn write_meta(path: &Path, meta: &RunMeta) -> Result<()> {
    let contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write meta {}", path.display()))?;
    Ok(())
}

pub fn read_meta(path: &Path) -> Result<RunMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}
