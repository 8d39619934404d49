//! Stable exit codes for smoke commands.

/// Every check passed.
pub const OK: i32 = 0;
/// Invalid config/scenario or an internal harness error.
pub const INVALID: i32 = 1;
/// At least one fatal failure (tool did not run, apply or destroy failed).
pub const FAILED: i32 = 2;
/// No fatal failures, but at least one non-fatal error (unexpected output, failed check).
pub const ERRORED: i32 = 3;
