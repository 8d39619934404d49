//! Test-only helpers: fake executables and terraform fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::options::TerraformOptions;

/// Write an executable `sh` script named `name` into `dir` and return its path.
#[cfg(unix)]
pub fn fake_binary(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    let mut perms = fs::metadata(&path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}

/// A fake `terraform` that appends its arguments to `./calls.log` (relative to
/// the directory it runs in) and succeeds.
///
/// Behaviour can be tuned through the child environment:
///
/// - `FAKE_APPLY_FAILURES=n`: the first `n` applies print `FAKE_APPLY_ERROR`
///   (default `Error installing provider`) to stderr and exit 1.
/// - `FAKE_DESTROY_FAIL=1`: destroy exits 1.
/// - `FAKE_OUTPUT_<name>=value`: `terraform output -raw <name>` prints `value`.
pub const FAKE_TERRAFORM: &str = r#"
echo "$*" >> calls.log
case "$1" in
  init)
    echo "Terraform has been successfully initialized!"
    ;;
  apply)
    count=$(cat apply.count 2>/dev/null || echo 0)
    count=$((count + 1))
    echo "$count" > apply.count
    if [ "$count" -le "${FAKE_APPLY_FAILURES:-0}" ]; then
      echo "${FAKE_APPLY_ERROR:-Error installing provider}" >&2
      exit 1
    fi
    echo "Apply complete! Resources: 1 added, 0 changed, 0 destroyed."
    ;;
  destroy)
    if [ "${FAKE_DESTROY_FAIL:-0}" = "1" ]; then
      echo "Error: deleting VM: permission denied" >&2
      exit 1
    fi
    echo "Destroy complete! Resources: 1 destroyed."
    ;;
  output)
    for last; do :; done
    eval "printf '%s' \"\${FAKE_OUTPUT_$last:-}\""
    ;;
  version)
    echo "Terraform v1.9.2"
    ;;
esac
"#;

/// Install [`FAKE_TERRAFORM`] into `dir`.
#[cfg(unix)]
pub fn fake_terraform(dir: &Path) -> Result<PathBuf> {
    fake_binary(dir, "terraform", FAKE_TERRAFORM)
}

/// Create `root/<name>` as an empty terraform directory and return options
/// pointing at it with retries that do not sleep.
pub fn terraform_fixture(root: &Path, name: &str) -> Result<TerraformOptions> {
    let dir = root.join(name);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let mut options = TerraformOptions::new(dir);
    options.time_between_retries_secs = 0;
    Ok(options)
}

/// Lines of `calls.log` written by [`FAKE_TERRAFORM`] in `dir`.
pub fn terraform_calls(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join("calls.log");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(contents.lines().map(str::to_string).collect())
}
