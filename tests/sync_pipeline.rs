//! End-to-end pipeline tests over the public API
//!
//! Drives source discovery, plan building and reconciliation against a
//! fake in-process control plane, the way the CLI wires them together.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Mutex;

use serde_json::{json, Value};
use tempfile::TempDir;

use latticectl::document::extract_entity_id;
use latticectl::plan::{build_apply_plan, RemoteInventory};
use latticectl::reconcile::Reconciler;
use latticectl::registry::{EntityKind, KindRegistry};
use latticectl::remote::DeleteOutcome;
use latticectl::source::{parse_source, DocumentSource, NoFetch};
use latticectl::{
    export_inventory, import_file, DocFormat, ExportLayout, ExportOptions, LatticeError,
    LatticeResult, RemoteClient, RemoteResource,
};

fn kind(kind: &str, singular: &str, plural: &str) -> EntityKind {
    EntityKind {
        kind: kind.to_string(),
        singular_name: singular.to_string(),
        plural_name: plural.to_string(),
        group: "proxy.lattice.io".to_string(),
        version: "v1".to_string(),
        namespaced: false,
        served: true,
        deprecated: false,
    }
}

/// Minimal in-process control plane
#[derive(Default)]
struct FakeRemote {
    kinds: Vec<EntityKind>,
    store: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl FakeRemote {
    fn new(kinds: Vec<EntityKind>) -> Self {
        Self {
            kinds,
            store: Mutex::new(HashMap::new()),
        }
    }

    fn count(&self, kind: &EntityKind) -> usize {
        self.store
            .lock()
            .unwrap()
            .get(&kind.kind)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    fn body_of(&self, kind: &EntityKind, id: &str) -> Option<Value> {
        self.store
            .lock()
            .unwrap()
            .get(&kind.kind)
            .and_then(|m| m.get(id))
            .cloned()
    }

    fn clear(&self) {
        self.store.lock().unwrap().clear();
    }
}

impl RemoteClient for FakeRemote {
    fn discover_kinds(&self) -> LatticeResult<Vec<EntityKind>> {
        Ok(self.kinds.clone())
    }

    fn list(
        &self,
        kind: &EntityKind,
        _filters: &[(String, String)],
    ) -> LatticeResult<Vec<RemoteResource>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .get(&kind.kind)
            .map(|resources| {
                resources
                    .values()
                    .filter_map(|body| RemoteResource::from_body(kind, body.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get(&self, kind: &EntityKind, id: &str) -> LatticeResult<Option<RemoteResource>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .get(&kind.kind)
            .and_then(|m| m.get(id))
            .and_then(|body| RemoteResource::from_body(kind, body.clone())))
    }

    fn create(&self, kind: &EntityKind, body: &Value) -> LatticeResult<RemoteResource> {
        let id = extract_entity_id(body).unwrap_or_else(|| "generated_1".to_string());
        let mut body = body.clone();
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), json!(id));
        }
        self.store
            .lock()
            .unwrap()
            .entry(kind.kind.clone())
            .or_default()
            .insert(id.clone(), body.clone());
        Ok(RemoteResource {
            kind: kind.kind.clone(),
            id,
            body,
            revision: None,
        })
    }

    fn replace(
        &self,
        kind: &EntityKind,
        id: &str,
        body: &Value,
        _expected_revision: Option<&str>,
    ) -> LatticeResult<RemoteResource> {
        self.store
            .lock()
            .unwrap()
            .entry(kind.kind.clone())
            .or_default()
            .insert(id.to_string(), body.clone());
        Ok(RemoteResource {
            kind: kind.kind.clone(),
            id: id.to_string(),
            body: body.clone(),
            revision: None,
        })
    }

    fn merge_patch(
        &self,
        kind: &EntityKind,
        id: &str,
        patch: &Value,
    ) -> LatticeResult<RemoteResource> {
        let mut store = self.store.lock().unwrap();
        let resources = store.entry(kind.kind.clone()).or_default();
        let Some(current) = resources.get_mut(id) else {
            return Err(LatticeError::NotFound {
                kind: kind.kind.clone(),
                id: id.to_string(),
            });
        };
        latticectl::codec::merge_values(current, patch);
        Ok(RemoteResource {
            kind: kind.kind.clone(),
            id: id.to_string(),
            body: current.clone(),
            revision: None,
        })
    }

    fn delete(&self, kind: &EntityKind, id: &str) -> LatticeResult<DeleteOutcome> {
        let removed = self
            .store
            .lock()
            .unwrap()
            .get_mut(&kind.kind)
            .and_then(|m| m.remove(id));
        Ok(if removed.is_some() {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    fn template(&self, kind: &EntityKind) -> LatticeResult<Value> {
        Ok(json!({"id": "", "name": format!("new {}", kind.singular_name)}))
    }
}

fn registry() -> KindRegistry {
    KindRegistry::from_kinds(vec![
        kind("Route", "route", "routes"),
        kind("Backend", "backend", "backends"),
        kind("Certificate", "certificate", "certificates"),
    ])
    .unwrap()
}

#[test]
fn apply_directory_end_to_end() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("b-route.yaml"),
        "kind: route\nid: r1\nname: api\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("a-backend.json"),
        "{\"kind\": \"backend\", \"id\": \"b1\", \"name\": \"payments\"}",
    )
    .unwrap();

    let registry = registry();
    let remote = FakeRemote::new(registry.kinds().to_vec());

    let source = DocumentSource::Directory {
        root: dir.path().to_path_buf(),
        recursive: false,
    };
    let raw = source.produce(&NoFetch).unwrap();
    let parsed = parse_source(&raw, &registry);
    let inventory = RemoteInventory::for_documents(&remote, &parsed.documents).unwrap();
    let plan = build_apply_plan(&parsed, &inventory);

    // lexicographic discovery: the backend file sorts first
    let ids: Vec<String> = plan.operations.iter().map(|op| op.id_label()).collect();
    assert_eq!(ids, vec!["b1", "r1"]);

    let report = Reconciler::new(&remote).execute(&plan);
    assert!(report.is_success());
    assert_eq!(remote.count(&kind("Route", "route", "routes")), 1);
    assert_eq!(remote.count(&kind("Backend", "backend", "backends")), 1);
}

#[test]
fn one_malformed_file_never_blocks_the_other_nine() {
    let dir = TempDir::new().unwrap();
    for i in 0..9 {
        fs::write(
            dir.path().join(format!("route-{i}.json")),
            format!("{{\"kind\": \"route\", \"id\": \"r{i}\"}}"),
        )
        .unwrap();
    }
    fs::write(dir.path().join("broken.json"), "{\"kind\": ").unwrap();

    let registry = registry();
    let remote = FakeRemote::new(registry.kinds().to_vec());

    let source = DocumentSource::Directory {
        root: dir.path().to_path_buf(),
        recursive: false,
    };
    let raw = source.produce(&NoFetch).unwrap();
    let parsed = parse_source(&raw, &registry);
    let inventory = RemoteInventory::for_documents(&remote, &parsed.documents).unwrap();
    let plan = build_apply_plan(&parsed, &inventory);
    let report = Reconciler::new(&remote).execute(&plan);

    assert_eq!(report.applied_count(), 9);
    assert_eq!(report.malformed.len(), 1);
    assert!(!report.is_success());
}

#[test]
fn second_apply_of_same_directory_plans_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("route.yaml"),
        "kind: route\nid: r1\nname: stable\n",
    )
    .unwrap();

    let registry = registry();
    let remote = FakeRemote::new(registry.kinds().to_vec());
    let source = DocumentSource::Directory {
        root: dir.path().to_path_buf(),
        recursive: false,
    };

    for pass in 0..2 {
        let raw = source.produce(&NoFetch).unwrap();
        let parsed = parse_source(&raw, &registry);
        let inventory = RemoteInventory::for_documents(&remote, &parsed.documents).unwrap();
        let plan = build_apply_plan(&parsed, &inventory);
        if pass == 0 {
            assert_eq!(plan.create_count(), 1);
        } else {
            assert_eq!(plan.create_count() + plan.update_count(), 0);
            assert_eq!(plan.skipped.len(), 1);
        }
        Reconciler::new(&remote).execute(&plan);
    }
}

#[test]
fn export_clear_import_restores_every_resource() {
    let registry = registry();
    let remote = FakeRemote::new(registry.kinds().to_vec());
    let route = kind("Route", "route", "routes");
    let backend = kind("Backend", "backend", "backends");
    let cert = kind("Certificate", "certificate", "certificates");

    remote
        .create(&route, &json!({"id": "r1", "name": "api"}))
        .unwrap();
    remote
        .create(&route, &json!({"id": "r2", "name": "www"}))
        .unwrap();
    remote
        .create(&backend, &json!({"id": "b1", "targets": [{"port": 8080}]}))
        .unwrap();
    remote
        .create(&cert, &json!({"id": "c1", "name": "wildcard"}))
        .unwrap();

    let dir = TempDir::new().unwrap();
    let dump = dir.path().join("dump.ndjson");
    let options = ExportOptions {
        layout: ExportLayout::Aggregate,
        format: DocFormat::NdJson,
        ..Default::default()
    };
    let exported = export_inventory(&remote, &registry, &dump, &options).unwrap();
    assert_eq!(exported.resources, 4);

    remote.clear();
    assert_eq!(remote.count(&route), 0);

    let report = import_file(&dump, Some(DocFormat::NdJson), &remote, &registry).unwrap();
    assert!(report.is_success());
    assert_eq!(report.applied_count(), 4);

    assert_eq!(remote.count(&route), 2);
    assert_eq!(remote.count(&backend), 1);
    assert_eq!(remote.count(&cert), 1);
    assert_eq!(
        remote.body_of(&backend, "b1").unwrap()["targets"],
        json!([{"port": 8080}])
    );
}
