//! Parsing of `KEY=VALUE` environment entries.

use anyhow::{Result, bail};

/// Split each entry on the first `=`. Values may be empty; keys may not.
pub fn parse_env_vars(entries: &[String]) -> Result<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("env var {entry:?} must have the form KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("env var {entry:?} has an empty key");
        }
        parsed.push((key.to_string(), value.to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn splits_on_first_equals() {
        let parsed =
            parse_env_vars(&strings(&["TF_LOG=DEBUG", "OPTS=a=b", "EMPTY="])).expect("parse");
        assert_eq!(
            parsed,
            vec![
                ("TF_LOG".to_string(), "DEBUG".to_string()),
                ("OPTS".to_string(), "a=b".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn rejects_missing_separator() {
        let err = parse_env_vars(&strings(&["PROXMOX_TOKEN"])).expect_err("no '='");
        assert!(err.to_string().contains("KEY=VALUE"));
    }

    #[test]
    fn rejects_empty_key() {
        let err = parse_env_vars(&strings(&["=value"])).expect_err("empty key");
        assert!(err.to_string().contains("empty key"));
    }
}
