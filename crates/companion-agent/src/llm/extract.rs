//! Declarative reply extraction.
//!
//! Each provider carries an ordered list of JSON pointers. The first one
//! that resolves to a non-blank string wins.

use serde_json::Value;

/// Probe `paths` in order against `body` and return the first non-blank text, trimmed.
pub fn extract_text<S: AsRef<str>>(body: &Value, paths: &[S]) -> Option<String> {
    paths.iter().find_map(|path| {
        body.pointer(path.as_ref())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
    })
}
