//! Input-schema conversion for function tools

use serde_json::{Map, Value};

/// Convert a tool's input schema into function-calling parameters
///
/// The root type defaults to `"object"` and `properties` to `{}`. A schema
/// that is not a JSON object (after treating null as empty) is rejected.
pub(super) fn to_parameters(input_schema: &Value) -> Result<Value, String> {
    let mut root = match sanitize_json_schema(input_schema) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(format!("input schema is not an object: {}", other)),
    };

    match root.get("type") {
        None | Some(Value::Null) => {
            root.insert("type".to_string(), Value::String("object".to_string()));
        }
        Some(Value::String(t)) if t == "object" => {}
        Some(other) => return Err(format!("root schema type must be object, got {}", other)),
    }
    if !root.get("properties").is_some_and(Value::is_object) {
        root.insert("properties".to_string(), Value::Object(Map::new()));
    }
    Ok(Value::Object(root))
}

/// Force every `description` in a schema to be a string, recursively
pub fn sanitize_json_schema(schema: &Value) -> Value {
    let Value::Object(obj) = schema else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in obj {
        let sanitized = match key.as_str() {
            "description" => Value::String(match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            }),
            "properties" | "definitions" | "$defs" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), sanitize_json_schema(prop)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" | "additionalProperties" | "not" => sanitize_json_schema(value),
            "anyOf" | "oneOf" | "allOf" => match value {
                Value::Array(items) => Value::Array(items.iter().map(sanitize_json_schema).collect()),
                other => other.clone(),
            },
            _ => value.clone(),
        };
        out.insert(key.clone(), sanitized);
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_root_type_and_properties() {
        assert_eq!(
            to_parameters(&json!({})).unwrap(),
            json!({"type": "object", "properties": {}})
        );
        assert_eq!(
            to_parameters(&Value::Null).unwrap(),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn test_rejects_non_object_schemas() {
        assert!(to_parameters(&json!("string")).is_err());
        assert!(to_parameters(&json!({"type": "array"})).is_err());
    }

    #[test]
    fn test_sanitizes_nested_descriptions() {
        let schema = json!({
            "type": "object",
            "properties": {
                "q": {"type": "string", "description": null},
                "opts": {
                    "type": "array",
                    "items": {"type": "object", "description": 42}
                }
            }
        });
        let out = to_parameters(&schema).unwrap();
        assert_eq!(out["properties"]["q"]["description"], "");
        assert_eq!(out["properties"]["opts"]["items"]["description"], "42");
    }
}
