//! Typed value → wire text

use super::Value;

/// Renders a value as payload text. Never fails.
///
/// Scalars use their canonical decimal form (`+5` decodes to `5` and is sent
/// back as `"5"`, `3.0` is sent as `"3"`), arrays are comma-joined without
/// brackets or spaces and text passes through unchanged.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Int32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Digital(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Int32Array(items) => join(items),
        Value::Float64Array(items) => join(items),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
