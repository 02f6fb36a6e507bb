//! Remote control-plane client boundary
//!
//! The sync engine only ever talks to the control plane through the
//! `RemoteClient` trait, so every component stays testable against an
//! in-memory fake. The blocking HTTP adapter lives in `remote::http`;
//! transport policy (auth scheme, retry, pagination) stays behind this
//! boundary and never leaks into the engine.

mod http;

pub use http::{HttpFetcher, HttpRemote};

use serde_json::Value;

use crate::document::RemoteResource;
use crate::error::LatticeResult;
use crate::registry::EntityKind;

/// Outcome of a remote delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The id did not exist; reported as a no-op, not an error
    NotFound,
}

/// Client contract for one control plane
pub trait RemoteClient {
    /// Fetch the catalog of entity kinds served by the control plane
    fn discover_kinds(&self) -> LatticeResult<Vec<EntityKind>>;

    /// List every resource of a kind, optionally filtered
    fn list(
        &self,
        kind: &EntityKind,
        filters: &[(String, String)],
    ) -> LatticeResult<Vec<RemoteResource>>;

    /// Fetch one resource; `Ok(None)` when the id does not exist
    fn get(&self, kind: &EntityKind, id: &str) -> LatticeResult<Option<RemoteResource>>;

    /// Create a resource; the body may or may not carry an explicit id
    fn create(&self, kind: &EntityKind, body: &Value) -> LatticeResult<RemoteResource>;

    /// Replace a resource wholesale
    ///
    /// When `expected_revision` is given and the remote revision moved,
    /// the call fails with `LatticeError::Conflict`.
    fn replace(
        &self,
        kind: &EntityKind,
        id: &str,
        body: &Value,
        expected_revision: Option<&str>,
    ) -> LatticeResult<RemoteResource>;

    /// Merge a sparse patch onto a resource
    fn merge_patch(&self, kind: &EntityKind, id: &str, patch: &Value)
        -> LatticeResult<RemoteResource>;

    /// Delete a resource by id
    fn delete(&self, kind: &EntityKind, id: &str) -> LatticeResult<DeleteOutcome>;

    /// Fetch the server-provided template document for a kind
    fn template(&self, kind: &EntityKind) -> LatticeResult<Value>;
}
