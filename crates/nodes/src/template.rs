//! `{{name}}` interpolation and dot-path extraction over execution variables.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern is valid"));

/// Replace every `{{name}}` in `template` with the matching variable.
///
/// Placeholders whose variable is absent are left exactly as written.
/// Strings are inserted raw; every other value is rendered as compact JSON.
pub fn interpolate(template: &str, variables: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_owned(),
        })
        .into_owned()
}

/// Render a variable the way it appears inside an interpolated string.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a dot-separated path (`a.b.c`) against a nested value.
///
/// Numeric segments index into arrays.  Any missing segment yields `None`.
pub fn extract_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
