//! Applying patch layers to JSON documents.

use serde_json::{Map, Value};
use tracing::debug;

/// Apply one patch layer to `document`.
///
/// - An object merges into an object, recursively.
/// - An array of operation objects is an operation list.
/// - An array of operation lists is a list of independent patch sets.
/// - Anything else replaces the document.
pub fn apply_layer(document: Value, patch: Value) -> Result<Value, String> {
    match patch {
        Value::Object(patch) => Ok(merge(document, patch)),
        Value::Array(items) if is_operation_list(&items) => {
            let mut document = document;
            apply_patch_set(&mut document, &items)?;
            Ok(document)
        }
        Value::Array(items) if is_patch_set_list(&items) => {
            let mut document = document;
            for set in &items {
                if let Value::Array(operations) = set {
                    apply_patch_set(&mut document, operations)?;
                }
            }
            Ok(document)
        }
        other => Ok(other),
    }
}

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; any other value in `patch` replaces the value
/// in `base`. A non-object `base` is replaced by the patch object.
pub fn merge(base: Value, patch: Map<String, Value>) -> Value {
    let mut base = match base {
        Value::Object(map) => map,
        _ => return Value::Object(patch),
    };

    for (key, value) in patch {
        let merged = match (base.remove(&key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(inner)) => merge(existing, inner),
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    Value::Object(base)
}

fn is_operation(value: &Value) -> bool {
    value.get("op").is_some_and(Value::is_string)
}

fn is_operation_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(is_operation)
}

fn is_patch_set_list(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| matches!(item, Value::Array(ops) if ops.iter().all(is_operation)))
}

/// Apply operations in order. A failed `test` skips the rest of the set.
fn apply_patch_set(document: &mut Value, operations: &[Value]) -> Result<(), String> {
    for operation in operations {
        let op = operation
            .get("op")
            .and_then(Value::as_str)
            .ok_or("patch operation without 'op'")?;
        let path = operation
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("'{}' operation without 'path'", op))?;

        match op {
            "test" => {
                let expected = operation.get("value");
                let inverse = operation
                    .get("inverse")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let actual = document.pointer(path);
                let passed = match expected {
                    Some(expected) => actual == Some(expected),
                    None => actual.is_some(),
                };
                if passed == inverse {
                    debug!(path, "Patch test failed, skipping rest of set");
                    return Ok(());
                }
            }
            "add" => {
                let value = required_value(operation, op)?;
                add(document, path, value)?;
            }
            "replace" => {
                let value = required_value(operation, op)?;
                let target = document
                    .pointer_mut(path)
                    .ok_or_else(|| format!("cannot replace missing '{}'", path))?;
                *target = value;
            }
            "remove" => {
                remove(document, path)?;
            }
            other => return Err(format!("unsupported patch operation '{}'", other)),
        }
    }
    Ok(())
}

fn required_value(operation: &Value, op: &str) -> Result<Value, String> {
    operation
        .get("value")
        .cloned()
        .ok_or_else(|| format!("'{}' operation without 'value'", op))
}

/// Split a JSON pointer into its parent pointer and unescaped last token.
fn split_pointer(path: &str) -> Result<(&str, String), String> {
    let index = path
        .rfind('/')
        .ok_or_else(|| format!("invalid JSON pointer '{}'", path))?;
    let token = path[index + 1..].replace("~1", "/").replace("~0", "~");
    Ok((&path[..index], token))
}

fn add(document: &mut Value, path: &str, value: Value) -> Result<(), String> {
    if path.is_empty() {
        *document = value;
        return Ok(());
    }

    let (parent, token) = split_pointer(path)?;
    match document.pointer_mut(parent) {
        Some(Value::Object(map)) => {
            map.insert(token, value);
            Ok(())
        }
        Some(Value::Array(items)) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(&token, items.len() + 1)?;
            items.insert(index, value);
            Ok(())
        }
        Some(_) => Err(format!("cannot add below a scalar at '{}'", parent)),
        None => Err(format!("cannot add to missing '{}'", parent)),
    }
}

fn remove(document: &mut Value, path: &str) -> Result<(), String> {
    let (parent, token) = split_pointer(path)?;
    match document.pointer_mut(parent) {
        Some(Value::Object(map)) => map
            .remove(&token)
            .map(|_| ())
            .ok_or_else(|| format!("cannot remove missing '{}'", path)),
        Some(Value::Array(items)) => {
            let index = parse_index(&token, items.len())?;
            items.remove(index);
            Ok(())
        }
        _ => Err(format!("cannot remove missing '{}'", path)),
    }
}

fn parse_index(token: &str, bound: usize) -> Result<usize, String> {
    token
        .parse::<usize>()
        .ok()
        .filter(|index| *index < bound)
        .ok_or_else(|| format!("array index '{}' out of range", token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_patch_deep_merges() {
        let merged = apply_layer(
            json!({"a": {"x": 1, "y": 2}, "b": [1]}),
            json!({"a": {"y": 3, "z": 4}, "b": [2]}),
        )
        .unwrap();
        assert_eq!(merged, json!({"a": {"x": 1, "y": 3, "z": 4}, "b": [2]}));
    }

    #[test]
    fn test_scalar_patch_replaces() {
        assert_eq!(apply_layer(json!({"a": 1}), json!(5)).unwrap(), json!(5));
        assert_eq!(
            apply_layer(json!({"a": 1}), json!([1, 2])).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_operation_list() {
        let patched = apply_layer(
            json!({"items": ["a", "b"], "speed": 1, "old": true}),
            json!([
                {"op": "add", "path": "/items/-", "value": "c"},
                {"op": "add", "path": "/items/0", "value": "z"},
                {"op": "replace", "path": "/speed", "value": 2},
                {"op": "remove", "path": "/old"}
            ]),
        )
        .unwrap();
        assert_eq!(patched, json!({"items": ["z", "a", "b", "c"], "speed": 2}));
    }

    #[test]
    fn test_failed_test_skips_only_its_set() {
        let patched = apply_layer(
            json!({"mode": "easy", "n": 0}),
            json!([
                [
                    {"op": "test", "path": "/mode", "value": "hard"},
                    {"op": "replace", "path": "/n", "value": 1}
                ],
                [
                    {"op": "test", "path": "/mode", "value": "easy"},
                    {"op": "add", "path": "/extra", "value": true}
                ]
            ]),
        )
        .unwrap();
        assert_eq!(patched, json!({"mode": "easy", "n": 0, "extra": true}));
    }

    #[test]
    fn test_inverse_and_existence_tests() {
        let patched = apply_layer(
            json!({"a": 1}),
            json!([
                {"op": "test", "path": "/b", "inverse": true},
                {"op": "add", "path": "/b", "value": 2}
            ]),
        )
        .unwrap();
        assert_eq!(patched, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_bad_operations_fail() {
        assert!(apply_layer(json!({}), json!([{"op": "move", "path": "/a"}])).is_err());
        assert!(apply_layer(json!({}), json!([{"op": "replace", "path": "/a", "value": 1}])).is_err());
        assert!(apply_layer(json!([1]), json!([{"op": "remove", "path": "/5"}])).is_err());
    }

    #[test]
    fn test_pointer_escapes() {
        let patched = apply_layer(
            json!({"a/b": 1}),
            json!([{"op": "remove", "path": "/a~1b"}]),
        )
        .unwrap();
        assert_eq!(patched, json!({}));
    }
}
