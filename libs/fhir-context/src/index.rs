//! In-memory definition index
//!
//! Holds already loaded FHIR JSON resources and answers [`Fishable`] lookups by id,
//! name or canonical URL. Resources added later shadow earlier ones with the same key,
//! so local definitions can override those of a dependency package.

use crate::error::{Error, Result};
use crate::fishable::{FishKind, Fishable, Metadata};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

struct IndexedResource {
    metadata: Metadata,
    resource: Arc<Value>,
}

#[derive(Default)]
pub struct DefinitionIndex {
    resources: Vec<IndexedResource>,
    by_key: HashMap<String, Vec<usize>>,
}

impl DefinitionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a set of resources.
    pub fn from_resources(resources: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut index = Self::new();
        for resource in resources {
            index.add(resource)?;
        }
        Ok(index)
    }

    /// Add one resource. Resources without a `resourceType` are rejected.
    pub fn add(&mut self, resource: Value) -> Result<()> {
        if resource.get("resourceType").and_then(Value::as_str).is_none() {
            return Err(Error::InvalidResource(
                "resource is missing resourceType".into(),
            ));
        }
        let metadata = Metadata::from_resource(&resource);
        if metadata.resource_type == "StructureDefinition" && metadata.sd_type.is_none() {
            return Err(Error::InvalidStructureDefinition(format!(
                "'{}' could not be read as a StructureDefinition",
                metadata.id
            )));
        }

        let position = self.resources.len();
        let mut keys = vec![metadata.id.clone(), metadata.name.clone()];
        if let Some(url) = &metadata.url {
            keys.push(url.clone());
        }
        keys.retain(|k| !k.is_empty());
        keys.dedup();
        for key in keys {
            self.by_key.entry(key).or_default().push(position);
        }

        tracing::trace!(
            id = %metadata.id,
            kind = %metadata.fish_kind,
            "Indexed definition"
        );
        self.resources.push(IndexedResource {
            metadata,
            resource: Arc::new(resource),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn find(&self, item: &str, kinds: &[FishKind]) -> Option<&IndexedResource> {
        let (key, version) = match item.split_once('|') {
            Some((key, version)) => (key, Some(version)),
            None => (item, None),
        };
        let candidates = self.by_key.get(key)?;
        let matches_version =
            |r: &&IndexedResource| version.is_none() || r.metadata.version.as_deref() == version;

        if kinds.is_empty() {
            return candidates
                .iter()
                .rev()
                .map(|&i| &self.resources[i])
                .find(matches_version);
        }
        kinds.iter().find_map(|kind| {
            candidates
                .iter()
                .rev()
                .map(|&i| &self.resources[i])
                .filter(|r| r.metadata.fish_kind == *kind)
                .find(matches_version)
        })
    }
}

impl Fishable for DefinitionIndex {
    fn fish_for_fhir(&self, item: &str, kinds: &[FishKind]) -> Option<Arc<Value>> {
        self.find(item, kinds).map(|r| Arc::clone(&r.resource))
    }

    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        self.find(item, kinds).map(|r| r.metadata.clone())
    }
}
