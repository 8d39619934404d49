//! Pure logic shared by the tool checks and the terraform executor.

pub mod args;
pub mod env;
pub mod hcl;
pub mod options;
pub mod retryable;
pub mod types;
