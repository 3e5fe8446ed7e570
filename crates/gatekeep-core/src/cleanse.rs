//! Masking of sensitive values before request context leaves the engine.

use serde_json::{Map, Value};

/// Replacement written in place of a sensitive value.
pub const CLEANSED_SUBSTITUTE: &str = "********************";

// Matched case-insensitively against object keys.
const SENSITIVE_MARKERS: [&str; 7] = ["API", "TOKEN", "KEY", "SECRET", "PASS", "SIGNATURE", "COOKIE"];

pub fn is_sensitive_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    SENSITIVE_MARKERS.iter().any(|m| upper.contains(m))
}

/// Recursively copy `value`, masking every value stored under a sensitive key.
pub fn cleanse_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                if is_sensitive_key(k) {
                    out.insert(k.clone(), Value::String(CLEANSED_SUBSTITUTE.to_string()));
                } else {
                    out.insert(k.clone(), cleanse_value(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(cleanse_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_values_are_masked() {
        let raw = json!({
            "complex": {
                "dict": { "foo": "bar" },
                "list": ["foo", { "api_key": "x" }],
                "password": "s3cret",
            }
        });
        let clean = cleanse_value(&raw);
        assert_eq!(clean["complex"]["dict"]["foo"], "bar");
        assert_eq!(clean["complex"]["password"], CLEANSED_SUBSTITUTE);
        assert_eq!(clean["complex"]["list"][1]["api_key"], CLEANSED_SUBSTITUTE);
        assert_eq!(clean["complex"]["list"][0], "foo");
    }
}
