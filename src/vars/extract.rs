//! JSON-path value extraction from response bodies.
//!
//! Paths are dot-separated field traversals only; array indexing and
//! wildcards are not supported. A missing path is a logged no-op so that one
//! bad extractor never aborts the rest of the batch.

use super::VariableContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared rule mapping a response field path to a variable name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extractor {
    /// Extraction kind; only "json" is understood
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// Dot-separated field path, optionally prefixed with `$`
    #[serde(alias = "expression")]
    pub path: String,
    /// Name the extracted value is stored under (local scope)
    #[serde(alias = "variable", rename = "variableName")]
    pub variable_name: String,
}

fn default_kind() -> String {
    "json".to_string()
}

pub(super) fn extract_into(ctx: &mut VariableContext, body: &str, extractors: &[Extractor]) {
    if body.is_empty() || extractors.is_empty() {
        return;
    }

    let root: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            log::error!("failed to parse response body as JSON: {}", err);
            return;
        }
    };

    for extractor in extractors {
        if extractor.kind != "json" {
            log::warn!("unsupported extractor type: {}", extractor.kind);
            continue;
        }
        match walk_path(&root, &extractor.path) {
            Some(Value::Null) | None => {
                log::warn!("path not found in response: {}", extractor.path);
            }
            Some(value) => {
                ctx.set_local(&extractor.variable_name, value.clone());
            }
        }
    }
}

/// Walk a dot-separated field path. Returns `None` when any segment is
/// missing or the current node is not an object.
fn walk_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.strip_prefix('$').unwrap_or(path);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);

    let mut current = root;
    for segment in trimmed.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}
