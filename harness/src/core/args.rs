//! Command-line arguments for each terraform subcommand.

use crate::core::hcl::var_args;
use crate::core::options::TerraformOptions;

pub fn init_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = strings(&["init", "-input=false", "-upgrade=false"]);
    push_color(&mut args, options);
    args
}

pub fn apply_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = strings(&["apply", "-input=false", "-auto-approve", "-lock=false"]);
    push_color(&mut args, options);
    push_variables(&mut args, options);
    args
}

pub fn destroy_args(options: &TerraformOptions) -> Vec<String> {
    let mut args = strings(&["destroy", "-auto-approve", "-input=false", "-lock=false"]);
    push_color(&mut args, options);
    push_variables(&mut args, options);
    args
}

pub fn output_args(options: &TerraformOptions, name: &str) -> Vec<String> {
    let mut args = strings(&["output", "-raw"]);
    push_color(&mut args, options);
    args.push(name.to_string());
    args
}

fn push_color(args: &mut Vec<String>, options: &TerraformOptions) {
    if options.no_color {
        args.push("-no-color".to_string());
    }
}

fn push_variables(args: &mut Vec<String>, options: &TerraformOptions) {
    args.extend(var_args(&options.vars));
    for path in &options.var_files {
        args.push("-var-file".to_string());
        args.push(path.display().to_string());
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> TerraformOptions {
        let mut options = TerraformOptions::new("infra/k3s");
        options.vars.insert("node_count".to_string(), json!(1));
        options.var_files.push("variables.tfvars".into());
        options
    }

    #[test]
    fn init_skips_variables() {
        assert_eq!(
            init_args(&options()),
            vec!["init", "-input=false", "-upgrade=false"]
        );
    }

    #[test]
    fn apply_appends_vars_then_var_files() {
        assert_eq!(
            apply_args(&options()),
            vec![
                "apply",
                "-input=false",
                "-auto-approve",
                "-lock=false",
                "-var",
                "node_count=1",
                "-var-file",
                "variables.tfvars",
            ]
        );
    }

    #[test]
    fn destroy_honours_no_color() {
        let mut options = options();
        options.no_color = true;
        let args = destroy_args(&options);
        assert_eq!(args[0], "destroy");
        assert!(args.contains(&"-no-color".to_string()));
        assert!(args.ends_with(&["-var-file".to_string(), "variables.tfvars".to_string()]));
    }

    #[test]
    fn output_puts_name_last() {
        assert_eq!(
            output_args(&options(), "node_ip"),
            vec!["output", "-raw", "node_ip"]
        );
    }
}
