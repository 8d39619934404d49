//! Render variable values as HCL literals for `-var key=value`.
//!
//! Terraform parses the right-hand side of `-var` as HCL when the variable is
//! typed as a list, map, or object, so composite values have to be written in
//! that syntax. Top-level strings are passed through unquoted.

use std::collections::BTreeMap;

use serde_json::Value;

/// Build `-var key=value` argument pairs, ordered by key.
pub fn var_args(vars: &BTreeMap<String, Value>) -> Vec<String> {
    let mut args = Vec::with_capacity(vars.len() * 2);
    for (key, value) in vars {
        args.push("-var".to_string());
        args.push(format!("{key}={}", to_hcl(value, false)));
    }
    args
}

/// Render a single value. `nested` controls whether strings are quoted.
pub fn to_hcl(value: &Value, nested: bool) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) if nested => quote(text),
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(|item| to_hcl(item, true)).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            let rendered: Vec<String> = entries
                .into_iter()
                .map(|(key, item)| format!("{} = {}", quote(key), to_hcl(item, true)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            // Template sequences would otherwise be evaluated.
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(ch);
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
