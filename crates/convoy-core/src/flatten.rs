//! Flattening of nested values into `key=value` assignments
//!
//! ```yaml
//! one: 1
//! two:
//!   three: 3
//!   four-five: {six: true}
//! ```
//!
//! becomes `one=1`, `two.four_five.six=true`, `two.three=3`.
//!
//! Assignments are sorted by dotted key. The templating tool applies `--set`
//! flags last-write-wins, so the order has to be stable across runs.

use serde_json::Value as JsonValue;

/// Flatten a value into sorted `dotted.key=value` pairs
pub fn collapse(value: &JsonValue) -> Vec<String> {
    collapse_with_prefix(None, value)
}

/// Flatten a value with every key prefixed by `prefix.`
pub fn collapse_with_prefix(prefix: Option<&str>, value: &JsonValue) -> Vec<String> {
    let mut path = Vec::new();
    if let Some(prefix) = prefix {
        path.push(normalize_key(prefix));
    }

    let mut pairs = Vec::new();
    collect(value, &mut path, &mut pairs);
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

fn collect(value: &JsonValue, path: &mut Vec<String>, out: &mut Vec<(String, String)>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                path.push(normalize_key(key));
                collect(child, path, out);
                path.pop();
            }
        }
        scalar => {
            if path.is_empty() {
                return;
            }
            out.push((path.join("."), render_scalar(scalar)));
        }
    }
}

/// Hyphens are not valid in template value paths
fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
}

fn render_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_scalar).collect();
            format!("{{{}}}", rendered.join(","))
        }
        JsonValue::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
