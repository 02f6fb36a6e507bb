//! Entity kind registry
//!
//! Kinds are server-defined: the control plane exposes its catalog through
//! a discovery call and the CLI never hardcodes entity types. The registry
//! is populated once per run and read-only afterwards, so a sync run
//! observes a fixed taxonomy even if the remote schema changes while the
//! run is in flight.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, LatticeResult};
use crate::remote::RemoteClient;

/// One entity kind exposed by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKind {
    /// Canonical kind name (e.g. `Route`)
    pub kind: String,
    pub singular_name: String,
    pub plural_name: String,
    /// API group the kind belongs to (e.g. `proxy.lattice.io`)
    pub group: String,
    /// Served API version (e.g. `v1`)
    pub version: String,
    #[serde(default)]
    pub namespaced: bool,
    #[serde(default = "default_true")]
    pub served: bool,
    #[serde(default)]
    pub deprecated: bool,
}

fn default_true() -> bool {
    true
}

impl EntityKind {
    /// `<group>/<version>` as used in manifest envelopes
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

/// Catalog of entity kinds, indexed by kind name and aliases
///
/// Lookup is case-insensitive over the kind name, singular name and plural
/// name. An alias shared by two different kinds is a configuration error
/// on the control plane side and is rejected at construction time.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    kinds: Vec<EntityKind>,
    aliases: HashMap<String, usize>,
}

impl KindRegistry {
    /// Build a registry from a discovered kind list
    pub fn from_kinds(kinds: Vec<EntityKind>) -> LatticeResult<Self> {
        let mut aliases: HashMap<String, usize> = HashMap::new();
        for (index, kind) in kinds.iter().enumerate() {
            for alias in [&kind.kind, &kind.singular_name, &kind.plural_name] {
                let key = alias.to_lowercase();
                match aliases.get(&key) {
                    Some(existing) if *existing != index => {
                        return Err(LatticeError::AmbiguousKind {
                            alias: key,
                            first: kinds[*existing].kind.clone(),
                            second: kind.kind.clone(),
                        });
                    }
                    _ => {
                        aliases.insert(key, index);
                    }
                }
            }
        }
        Ok(Self { kinds, aliases })
    }

    /// Populate the registry from the control plane's discovery endpoint
    pub fn discover(client: &dyn RemoteClient) -> LatticeResult<Self> {
        Self::from_kinds(client.discover_kinds()?)
    }

    /// Resolve a kind by name, singular or plural alias
    pub fn resolve(&self, name: &str) -> LatticeResult<&EntityKind> {
        self.aliases
            .get(&name.to_lowercase())
            .map(|index| &self.kinds[*index])
            .ok_or_else(|| LatticeError::UnknownKind {
                name: name.to_string(),
            })
    }

    /// All kinds in discovery order
    pub fn kinds(&self) -> &[EntityKind] {
        &self.kinds
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }
}

#[cfg(test)]
pub(crate) fn test_kind(kind: &str, singular: &str, plural: &str) -> EntityKind {
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
