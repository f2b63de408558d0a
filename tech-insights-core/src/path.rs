//! Dotted-path lookup into JSON values
//!
//! `metadata.name` walks object keys, numeric segments index arrays.
//! Keys that themselves contain dots (`metadata.annotations.backstage.io/techdocs-ref`)
//! are found by trying progressively longer joined segments.

use serde_json::Value;

/// Resolve `path` inside `value`. An empty path returns the value itself.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }
    let segments: Vec<&str> = path.split('.').collect();
    lookup(value, &segments)
}

fn lookup<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    if segments.is_empty() {
        return Some(value);
    }

    match value {
        Value::Object(map) => {
            for take in 1..=segments.len() {
                let key = segments[..take].join(".");
                if let Some(child) = map.get(&key) {
                    if let Some(found) = lookup(child, &segments[take..]) {
                        return Some(found);
                    }
                }
            }
            None
        }
        Value::Array(items) => {
            let index: usize = segments[0].parse().ok()?;
            lookup(items.get(index)?, &segments[1..])
        }
        _ => None,
    }
}

/// Like [`get_path`] but treats JSON `null` as absent.
pub fn get_defined<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    get_path(value, path).filter(|v| !v.is_null())
}
