//! Manifest armor
//!
//! Wraps a raw entity body in the envelope expected by orchestration
//! tooling: `apiVersion`, `kind` and `metadata.name` at the top level,
//! with the body itself under `spec`. `unwrap_manifest` is the exact
//! inverse: the body is carried verbatim, never rewritten.

use serde_json::{json, Value};

use crate::document::{extract_entity_id, extract_entity_name};
use crate::registry::EntityKind;

/// Wrap an entity body in a manifest envelope
pub fn wrap_manifest(body: &Value, kind: &EntityKind) -> Value {
    let name = extract_entity_name(body)
        .or_else(|| extract_entity_id(body))
        .unwrap_or_default();
    json!({
        "apiVersion": kind.api_version(),
        "kind": kind.kind,
        "metadata": { "name": name },
        "spec": body,
    })
}

/// True when a document is an armored manifest rather than a bare body
pub fn is_manifest(doc: &Value) -> bool {
    doc.get("apiVersion").is_some() && doc.get("kind").is_some() && doc.get("spec").is_some()
}

/// Unwrap a manifest envelope back into `(kind name, body)`
///
/// Returns `None` when the document is not armored.
pub fn unwrap_manifest(doc: &Value) -> Option<(String, Value)> {
    if !is_manifest(doc) {
        return None;
    }
    let kind = doc.get("kind")?.as_str()?.to_string();
    let spec = doc.get("spec")?.clone();
    Some((kind, spec))
}
