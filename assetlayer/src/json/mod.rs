//! JSON assets: layered documents and sub-path extraction.
//!
//! A JSON asset is read from its primary layer and then from every patch
//! layer in registration order (see [`patch::apply_layer`]). Sub-paths
//! (`/player.config:movement.speed`) are resolved against the finished
//! whole-file document.

pub mod patch;
pub mod path;

use serde_json::Value;

use crate::error::{AssetError, AssetResult};

/// Parse one layer of a JSON file.
pub fn parse_layer(path: &str, bytes: &[u8]) -> AssetResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| AssetError::malformed(path, e))
}

/// Fold parsed layers (primary first) into one document.
pub fn combine_layers(
    path: &str,
    primary: Value,
    patches: impl IntoIterator<Item = (String, Value)>,
) -> AssetResult<Value> {
    patches
        .into_iter()
        .try_fold(primary, |document, (layer, patch)| {
            patch::apply_layer(document, patch).map_err(|reason| {
                AssetError::malformed(path, format!("patch from '{}': {}", layer, reason))
            })
        })
}

/// Extract the value at `sub_path` from `document`.
pub fn extract(path: &str, document: &Value, sub_path: &str) -> AssetResult<Value> {
    path::query(document, sub_path)
        .cloned()
        .map_err(|reason| AssetError::SubPath {
            path: path.to_string(),
            sub_path: sub_path.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combine_layers_in_order() {
        let document = combine_layers(
            "/x.json",
            json!({"v": 1, "keep": true}),
            vec![
                ("s2".to_string(), json!({"v": 2})),
                ("s3".to_string(), json!([{"op": "replace", "path": "/v", "value": 3}])),
            ],
        )
        .unwrap();
        assert_eq!(document, json!({"v": 3, "keep": true}));
    }

    #[test]
    fn test_bad_patch_names_its_layer() {
        let err = combine_layers(
            "/x.json",
            json!({}),
            vec![("mod".to_string(), json!([{"op": "remove", "path": "/nope"}]))],
        )
        .unwrap_err();
        assert!(err.to_string().contains("mod"));
    }

    #[test]
    fn test_extract_missing_is_sub_path_error() {
        let err = extract("/x.json", &json!({"a": 1}), "b").unwrap_err();
        assert!(matches!(err, AssetError::SubPath { .. }));
    }

    #[test]
    fn test_parse_layer_rejects_invalid_json() {
        assert!(matches!(
            parse_layer("/x.json", b"{nope"),
            Err(AssetError::Malformed { .. })
        ));
    }
}
