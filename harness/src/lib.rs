//! Smoke-test harness for infrastructure tooling.
//!
//! The crate covers two kinds of checks that an infrastructure-as-code repo
//! wants before anything else runs:
//!
//! - **Tool checks**: spawn an external binary (`terraform`, `gpg`,
//!   `talosctl`, `flux`, ...) and assert it exits cleanly with the expected
//!   output.
//! - **Terraform lifecycle**: `init` + `apply` a configuration described by
//!   [`core::options::TerraformOptions`], then `destroy` it again.
//!
//! As in most of our crates the code is split in two:
//!
//! - **[`core`]**: Pure logic (option validation, argument building, HCL
//!   rendering, retryable-error matching, verdicts). No I/O.
//! - **[`io`]**: Process execution, config loading, and the terraform
//!   executor.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
