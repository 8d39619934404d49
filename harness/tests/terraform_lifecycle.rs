//! Terraform lifecycle tests against a scripted fake `terraform`.
//!
//! The fake records every invocation in `calls.log` inside the configuration
//! directory, which lets these tests assert on the exact command sequence.

#![cfg(unix)]

use std::time::Duration;

use harness::io::process::ProcessLimits;
use harness::io::terraform::Terraform;
use harness::test_support::{fake_terraform, terraform_calls, terraform_fixture};
use serde_json::json;

fn terraform(bin_dir: &std::path::Path) -> Terraform {
    let binary = fake_terraform(bin_dir).expect("fake terraform");
    Terraform::new(binary, ProcessLimits::new(Duration::from_secs(10), 100_000))
}

#[test]
fn init_and_apply_then_destroy_runs_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "k3s").expect("fixture");
    options.vars.insert("node_count".to_string(), json!(1));
    options.var_files.push("variables.tfvars".into());

    let output = terraform.init_and_apply(&options).expect("apply");
    assert!(output.contains("successfully initialized"));
    assert!(output.contains("Apply complete!"));
    terraform.destroy(&options).expect("destroy");

    let calls = terraform_calls(&options.terraform_dir).expect("calls");
    assert_eq!(
        calls,
        vec![
            "init -input=false -upgrade=false",
            "apply -input=false -auto-approve -lock=false -var node_count=1 -var-file variables.tfvars",
            "destroy -auto-approve -input=false -lock=false -var node_count=1 -var-file variables.tfvars",
        ]
    );
}

#[test]
fn retryable_apply_error_is_retried() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "talos")
        .expect("fixture")
        .with_default_retryable_errors();
    options.env_vars.push("FAKE_APPLY_FAILURES=2".to_string());

    terraform.init_and_apply(&options).expect("apply after retries");

    let applies = terraform_calls(&options.terraform_dir)
        .expect("calls")
        .into_iter()
        .filter(|call| call.starts_with("apply"))
        .count();
    assert_eq!(applies, 3);
}

#[test]
fn retries_are_bounded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "proxmox")
        .expect("fixture")
        .with_default_retryable_errors();
    options.max_retries = 1;
    options.env_vars.push("FAKE_APPLY_FAILURES=5".to_string());

    let err = terraform.apply(&options).expect_err("exhausted");
    let message = format!("{err:#}");
    assert!(message.contains("after 1 retries"), "{message}");
    assert!(message.contains("transient network error"), "{message}");
}

#[test]
fn unmatched_error_fails_without_retry() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "broken")
        .expect("fixture")
        .with_default_retryable_errors();
    options.env_vars.extend([
        "FAKE_APPLY_FAILURES=1".to_string(),
        "FAKE_APPLY_ERROR=Error: Unsupported argument".to_string(),
    ]);

    let err = terraform.apply(&options).expect_err("not retryable");
    assert!(format!("{err:#}").contains("Unsupported argument"));
    let calls = terraform_calls(&options.terraform_dir).expect("calls");
    assert_eq!(calls.len(), 1);
}

#[test]
fn guard_destroys_when_apply_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "k3s-node").expect("fixture");
    options.env_vars.push("FAKE_APPLY_FAILURES=1".to_string());

    {
        let _guard = terraform.destroy_on_drop(&options);
        terraform
            .init_and_apply(&options)
            .expect_err("apply fails without retryable patterns");
    }

    let calls = terraform_calls(&options.terraform_dir).expect("calls");
    assert!(calls.last().expect("calls").starts_with("destroy"));
}

#[test]
fn finish_reports_destroy_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "talos").expect("fixture");
    options.env_vars.push("FAKE_DESTROY_FAIL=1".to_string());

    let guard = terraform.destroy_on_drop(&options);
    terraform.init_and_apply(&options).expect("apply");
    let err = guard.finish().expect_err("destroy fails");
    assert!(format!("{err:#}").contains("permission denied"));

    let destroys = terraform_calls(&options.terraform_dir)
        .expect("calls")
        .into_iter()
        .filter(|call| call.starts_with("destroy"))
        .count();
    assert_eq!(destroys, 1);
}

#[test]
fn disarmed_guard_keeps_infrastructure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let options = terraform_fixture(temp.path(), "keep").expect("fixture");

    let guard = terraform.destroy_on_drop(&options);
    terraform.init_and_apply(&options).expect("apply");
    guard.disarm();

    let calls = terraform_calls(&options.terraform_dir).expect("calls");
    assert!(calls.iter().all(|call| !call.starts_with("destroy")));
}

#[test]
fn output_reads_named_value() {
    let temp = tempfile::tempdir().expect("tempdir");
    let terraform = terraform(temp.path());
    let mut options = terraform_fixture(temp.path(), "outputs").expect("fixture");
    options
        .env_vars
        .push("FAKE_OUTPUT_node_ip=10.0.0.5".to_string());

    assert_eq!(
        terraform.output(&options, "node_ip").expect("output"),
        "10.0.0.5"
    );
    assert_eq!(terraform.output(&options, "missing").expect("output"), "");
}

#[test]
fn command_log_collects_every_command() {
    let temp = tempfile::tempdir().expect("tempdir");
    let log = temp.path().join("results/terraform.log");
    let terraform = terraform(temp.path()).with_log(&log);
    let options = terraform_fixture(temp.path(), "logged").expect("fixture");

    terraform.init_and_apply(&options).expect("apply");
    terraform.destroy(&options).expect("destroy");

    let contents = std::fs::read_to_string(&log).expect("read log");
    assert!(contents.contains("successfully initialized"));
    assert!(contents.contains("Apply complete!"));
    assert!(contents.contains("Destroy complete!"));
}
