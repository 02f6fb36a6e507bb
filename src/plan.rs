//! Diff and plan building
//!
//! Stage 1 of a reconciliation pass: given the desired document set and a
//! snapshot of the remote inventory, compute the ordered operations that
//! bring the remote side in line. No network writes happen here; the plan
//! is immutable once built and a new pass always builds a new plan.
//!
//! `apply` never deletes resources that are merely absent from the
//! desired set. Deletes exist only in explicit delete plans, so a partial
//! sync can never be destructive.

use std::collections::HashMap;

use serde_json::Value;

use crate::document::{DesiredDocument, MalformedEntry, RemoteResource, SERVER_MANAGED_FIELDS};
use crate::error::LatticeResult;
use crate::registry::EntityKind;
use crate::remote::RemoteClient;
use crate::source::ParsedSource;

/// One planned write against the control plane
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    /// Create a resource, with or without an explicit id (upsert)
    Create { doc: DesiredDocument },
    /// Replace an existing resource wholesale
    Update {
        id: String,
        doc: DesiredDocument,
        /// Remote revision at snapshot time, for the optimistic precondition
        expected_revision: Option<String>,
    },
    /// Delete a resource by id (explicit delete plans only)
    Delete {
        kind: EntityKind,
        id: String,
        origin: String,
    },
}

impl SyncOperation {
    pub fn kind(&self) -> &EntityKind {
        match self {
            Self::Create { doc } => &doc.kind,
            Self::Update { doc, .. } => &doc.kind,
            Self::Delete { kind, .. } => kind,
        }
    }

    /// Resource id, or a placeholder for generate-on-create
    pub fn id_label(&self) -> String {
        match self {
            Self::Create { doc } => doc.id.clone().unwrap_or_else(|| "<generated>".to_string()),
            Self::Update { id, .. } => id.clone(),
            Self::Delete { id, .. } => id.clone(),
        }
    }

    pub fn origin(&self) -> &str {
        match self {
            Self::Create { doc } => &doc.origin,
            Self::Update { doc, .. } => &doc.origin,
            Self::Delete { origin, .. } => origin,
        }
    }
}

/// A desired document that matched the remote state exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub kind: String,
    pub id: String,
    pub origin: String,
}

/// Ordered operations plus the manifest of documents that produced none
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub operations: Vec<SyncOperation>,
    /// Unchanged documents, recorded but never re-applied
    pub skipped: Vec<SkippedDocument>,
    /// Documents that failed to parse or resolve
    pub malformed: Vec<MalformedEntry>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.skipped.is_empty() && self.malformed.is_empty()
    }

    pub fn create_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, SyncOperation::Create { .. }))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, SyncOperation::Update { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, SyncOperation::Delete { .. }))
            .count()
    }
}

/// Read-once snapshot of the remote inventory used for diffing
///
/// Fetched at the start of a pass and never refreshed mid-pass;
/// concurrent external changes surface on the next pass.
#[derive(Debug, Default)]
pub struct RemoteInventory {
    by_kind: HashMap<String, HashMap<String, RemoteResource>>,
}

impl RemoteInventory {
    /// Fetch the inventory for every kind referenced by the desired set
    pub fn for_documents(
        client: &dyn RemoteClient,
        documents: &[DesiredDocument],
    ) -> LatticeResult<Self> {
        let mut kinds: Vec<&EntityKind> = Vec::new();
        for doc in documents {
            if !kinds.iter().any(|k| k.kind == doc.kind.kind) {
                kinds.push(&doc.kind);
            }
        }
        Self::fetch(client, kinds)
    }

    /// Fetch the inventory for an explicit kind list
    pub fn fetch<'a>(
        client: &dyn RemoteClient,
        kinds: impl IntoIterator<Item = &'a EntityKind>,
    ) -> LatticeResult<Self> {
        let mut by_kind = HashMap::new();
        for kind in kinds {
            let resources = client.list(kind, &[])?;
            let lookup: HashMap<String, RemoteResource> = resources
                .into_iter()
                .map(|resource| (resource.id.clone(), resource))
                .collect();
            by_kind.insert(kind.kind.clone(), lookup);
        }
        Ok(Self { by_kind })
    }

    pub fn lookup(&self, kind: &EntityKind, id: &str) -> Option<&RemoteResource> {
        self.by_kind.get(&kind.kind).and_then(|m| m.get(id))
    }
}

/// Remove server-managed fields from a tree, at any depth
fn scrub_managed(value: &Value, managed: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !managed.contains(&key.as_str()))
                .map(|(key, v)| (key.clone(), scrub_managed(v, managed)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| scrub_managed(v, managed)).collect())
        }
        other => other.clone(),
    }
}

/// Structural equality modulo server-managed fields
pub fn bodies_equal(desired: &Value, remote: &Value) -> bool {
    scrub_managed(desired, SERVER_MANAGED_FIELDS) == scrub_managed(remote, SERVER_MANAGED_FIELDS)
}

/// Build the plan for an `apply` run
///
/// Creates and updates keep the discovery order of their source
/// documents; unchanged documents are recorded as skipped; malformed
/// entries pass through untouched. Nothing is ever deleted here.
pub fn build_apply_plan(parsed: &ParsedSource, inventory: &RemoteInventory) -> SyncPlan {
    let mut plan = SyncPlan {
        malformed: parsed.malformed.clone(),
        ..Default::default()
    };
    for doc in &parsed.documents {
        match &doc.id {
            None => plan.operations.push(SyncOperation::Create { doc: doc.clone() }),
            Some(id) => match inventory.lookup(&doc.kind, id) {
                Some(remote) => {
                    if bodies_equal(&doc.body, &remote.body) {
                        plan.skipped.push(SkippedDocument {
                            kind: doc.kind.kind.clone(),
                            id: id.clone(),
                            origin: doc.origin.clone(),
                        });
                    } else {
                        plan.operations.push(SyncOperation::Update {
                            id: id.clone(),
                            doc: doc.clone(),
                            expected_revision: remote.revision.clone(),
                        });
                    }
                }
                // id declared locally but absent remotely: create with that id
                None => plan.operations.push(SyncOperation::Create { doc: doc.clone() }),
            },
        }
    }
    plan
}

/// Build the plan for an explicit `delete` run
///
/// Deletes are emitted in reverse discovery order so dependents go away
/// before the resources they reference. Documents without an id cannot
/// be addressed and are recorded as malformed.
pub fn build_delete_plan(parsed: &ParsedSource) -> SyncPlan {
    let mut plan = SyncPlan {
        malformed: parsed.malformed.clone(),
        ..Default::default()
    };
    for doc in parsed.documents.iter().rev() {
        match &doc.id {
            Some(id) => plan.operations.push(SyncOperation::Delete {
                kind: doc.kind.clone(),
                id: id.clone(),
                origin: doc.origin.clone(),
            }),
            None => plan.malformed.push(MalformedEntry {
                origin: doc.origin.clone(),
                message: "document has no id to delete".to_string(),
            }),
        }
    }
    plan
}

/// Build a delete plan for ids passed on the command line
pub fn build_delete_plan_for_ids(kind: &EntityKind, ids: &[String]) -> SyncPlan {
    let mut plan = SyncPlan::default();
    for id in ids.iter().rev() {
        plan.operations.push(SyncOperation::Delete {
            kind: kind.clone(),
            id: id.clone(),
            origin: "argument".to_string(),
        });
    }
    plan
}
