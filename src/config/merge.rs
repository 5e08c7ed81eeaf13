//! JSON layer merging
//!
//! Objects merge key by key; arrays and scalars are replaced by the later
//! layer. Arrays never concatenate, which is the same rule settings lists
//! follow across scopes.

use serde_json::{Map, Value};

/// Overlay `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order; the last layer wins.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Turn dotted object keys into nested objects.
///
/// `{"a.b": 1, "a": {"c": 2}}` becomes `{"a": {"b": 1, "c": 2}}`. Nested
/// objects are expanded too. When a dotted and a nested spelling set the
/// same leaf, the dotted one wins.
pub fn expand_dotted(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };

    let mut plain = Map::new();
    let mut dotted = Vec::new();
    for (key, value) in map {
        let value = expand_dotted(value);
        if key.contains('.') {
            dotted.push((key, value));
        } else {
            plain.insert(key, value);
        }
    }

    let mut result = Value::Object(plain);
    for (key, value) in dotted {
        let nested = key
            .split('.')
            .rev()
            .fold(value, |inner, segment| {
                let mut wrapper = Map::new();
                wrapper.insert(segment.to_string(), inner);
                Value::Object(wrapper)
            });
        result = deep_merge(result, nested);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_merge() {
        let merged = deep_merge(
            json!({"cache": {"max_entries": 512, "max_workspaces": 8}}),
            json!({"cache": {"max_entries": 64}}),
        );
        assert_eq!(merged, json!({"cache": {"max_entries": 64, "max_workspaces": 8}}));
    }

    #[test]
    fn test_arrays_replace() {
        let merged = deep_merge(json!({"list": ["a", "b"]}), json!({"list": ["c"]}));
        assert_eq!(merged["list"], json!(["c"]));
    }

    #[test]
    fn test_layer_precedence() {
        let merged = merge_layers(vec![
            json!({"log_level": "info", "io": {"retry_attempts": 3}}),
            json!({"log_level": "debug"}),
            json!({"io": {"retry_attempts": 1}}),
        ]);
        assert_eq!(merged["log_level"], "debug");
        assert_eq!(merged["io"]["retry_attempts"], 1);
    }

    #[test]
    fn test_expand_dotted_keys() {
        let expanded = expand_dotted(json!({
            "thresholds.mid": 200,
            "thresholds": {"high": 900},
            "emoji": {"x.y": "z"}
        }));
        assert_eq!(
            expanded,
            json!({
                "thresholds": {"mid": 200, "high": 900},
                "emoji": {"x": {"y": "z"}}
            })
        );
    }

    #[test]
    fn test_dotted_spelling_wins() {
        let expanded = expand_dotted(json!({
            "thresholds": {"mid": 1},
            "thresholds.mid": 2
        }));
        assert_eq!(expanded["thresholds"]["mid"], 2);
    }

    #[test]
    fn test_non_objects_untouched() {
        assert_eq!(expand_dotted(json!([1, 2])), json!([1, 2]));
    }
}
