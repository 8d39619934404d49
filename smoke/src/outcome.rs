use harness::exit_codes;
use serde::{Deserialize, Serialize};

use crate::checks::Judgment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    CheckFailed,
    ApplyFailed,
    DestroyFailed,
}

impl Outcome {
    /// Apply/destroy failures are fatal; failed checks are not.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => exit_codes::OK,
            Outcome::CheckFailed => exit_codes::ERRORED,
            Outcome::ApplyFailed | Outcome::DestroyFailed => exit_codes::FAILED,
        }
    }
}

pub fn classify_outcome(apply_failed: bool, destroy_failed: bool, judgment: &Judgment) -> Outcome {
    if apply_failed {
        Outcome::ApplyFailed
    } else if destroy_failed {
        Outcome::DestroyFailed
    } else if !judgment.all_passed() {
        Outcome::CheckFailed
    } else {
        Outcome::Success
    }
}

/// Exit code for a batch of runs: the most severe one wins.
pub fn combined_exit_code(outcomes: &[Outcome]) -> i32 {
    if outcomes
        .iter()
        .any(|outcome| outcome.exit_code() == exit_codes::FAILED)
    {
        exit_codes::FAILED
    } else if outcomes
        .iter()
        .any(|outcome| outcome.exit_code() == exit_codes::ERRORED)
    {
        exit_codes::ERRORED
    } else {
        exit_codes::OK
    }
}
