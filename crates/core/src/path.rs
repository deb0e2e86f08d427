//! Dot-path lookup into JSON payloads.
//!
//! Used by output mappings: `"data.value"` walks object keys, numeric
//! segments index into arrays, and an empty path (or `"$"`) selects the
//! whole payload. A path that does not resolve yields `None`.

use serde_json::Value;

/// Resolve `path` inside `root`.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() || path == "$" {
        return Some(root);
    }

    let mut current = root;
    for segment in path.trim_start_matches("$.").split('.') {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
