//! Dotted field paths into JSON parameter objects.

use serde_json::Value as JsonValue;

/// Resolves a dotted path such as `conditions.options.typeValidation`.
///
/// Numeric segments index into arrays. An empty path returns the root.
#[must_use]
pub fn lookup<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(root);
    }

    path.split('.').try_fold(root, |current, segment| match current {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Returns the string at `path`, if present and a string.
#[must_use]
pub fn lookup_str<'a>(root: &'a JsonValue, path: &str) -> Option<&'a str> {
    lookup(root, path).and_then(JsonValue::as_str)
}

/// Returns the array at `path`, if present and an array.
#[must_use]
pub fn lookup_array<'a>(root: &'a JsonValue, path: &str) -> Option<&'a Vec<JsonValue>> {
    lookup(root, path).and_then(JsonValue::as_array)
}
