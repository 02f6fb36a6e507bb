//! Core document models
//!
//! A `DesiredDocument` is one locally-declared entity on its way to the
//! control plane; a `RemoteResource` is a snapshot of what the control
//! plane currently holds for one id. Both carry their body as a raw
//! `serde_json::Value` tree because kinds are server-defined and have no
//! compile-time schema.

use serde_json::Value;

use crate::registry::EntityKind;

/// Body fields owned by the control plane, ignored when diffing
pub const SERVER_MANAGED_FIELDS: &[&str] = &["_version", "created_at", "updated_at"];

/// One locally-declared entity document
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredDocument {
    /// Resolved kind of the document
    pub kind: EntityKind,
    /// Resource id; absent means create-with-generated-id
    pub id: Option<String>,
    /// Raw entity body, envelope keys stripped
    pub body: Value,
    /// Where the document came from (path, URL, "stdin", ...)
    pub origin: String,
}

impl DesiredDocument {
    pub fn new(kind: EntityKind, body: Value, origin: impl Into<String>) -> Self {
        let id = extract_entity_id(&body);
        Self {
            kind,
            id,
            body,
            origin: origin.into(),
        }
    }

    /// Human-readable display name, falling back to the id
    pub fn display_name(&self) -> String {
        extract_entity_name(&self.body)
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// A document that failed to decode or resolve
///
/// Collected per document and surfaced in the final report; a malformed
/// document never blocks unrelated valid documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub origin: String,
    pub message: String,
}

/// Snapshot of one resource as currently held by the control plane
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResource {
    /// Kind name as registered on the remote side
    pub kind: String,
    pub id: String,
    pub body: Value,
    /// Opaque revision marker used for optimistic update preconditions
    pub revision: Option<String>,
}

impl RemoteResource {
    /// Build a snapshot from a raw remote body
    ///
    /// Returns `None` when the body carries no recognizable id, which
    /// means the resource cannot be addressed for updates.
    pub fn from_body(kind: &EntityKind, body: Value) -> Option<Self> {
        let id = extract_entity_id(&body)?;
        let revision = extract_revision(&body);
        Some(Self {
            kind: kind.kind.clone(),
            id,
            body,
            revision,
        })
    }
}

/// Extract the resource id from an entity body
///
/// Kinds disagree on the id field name; the fallback chain mirrors the
/// control plane's own lookup order.
pub fn extract_entity_id(body: &Value) -> Option<String> {
    body.get("id")
        .or_else(|| body.get("client_id"))
        .or_else(|| body.get("clientId"))
        .or_else(|| body.get("username"))
        .and_then(|id| id.as_str().map(|v| v.to_string()))
}

/// Extract a display name from an entity body
pub fn extract_entity_name(body: &Value) -> Option<String> {
    body.get("name")
        .or_else(|| body.get("client_name"))
        .or_else(|| body.get("clientName"))
        .or_else(|| body.get("label"))
        .or_else(|| body.get("username"))
        .and_then(|name| name.as_str().map(|v| v.to_string()))
}

/// Extract the revision marker, tolerating numeric representations
pub fn extract_revision(body: &Value) -> Option<String> {
    match body.get("_version") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
