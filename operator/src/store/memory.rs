use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::DynamicObject;
use otel_manifests::{Labels, ResourceKind};

use super::{ObjectStore, StoreError};

type Key = (ResourceKind, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, DynamicObject>,
    next_version: u64,
    writes: Vec<String>,
    failing: BTreeSet<ResourceKind>,
}

impl State {
    fn stamp(&mut self, object: &mut DynamicObject) {
        self.next_version += 1;
        object.metadata.resource_version = Some(self.next_version.to_string());
    }
}

/// In-process [`ObjectStore`] with resource versions and conflict detection.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn key(kind: ResourceKind, namespace: &str, name: &str) -> Key {
    (kind, namespace.to_string(), name.to_string())
}

fn key_of(kind: ResourceKind, object: &DynamicObject) -> Key {
    key(
        kind,
        object.metadata.namespace.as_deref().unwrap_or_default(),
        object.metadata.name.as_deref().unwrap_or_default(),
    )
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `object` as if another actor had written it. Returns the stored copy.
    pub fn insert(&self, kind: ResourceKind, mut object: DynamicObject) -> DynamicObject {
        let mut state = self.state.lock().unwrap();
        state.stamp(&mut object);
        state.objects.insert(key_of(kind, &object), object.clone());
        object
    }

    pub fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<DynamicObject> {
        let state = self.state.lock().unwrap();
        state.objects.get(&key(kind, namespace, name)).cloned()
    }

    pub fn names(&self, kind: ResourceKind) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    /// Every successful write, as `"<verb> <Kind>/<name>"`, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Makes every call for `kind` fail with a non-conflict error.
    pub fn fail_kind(&self, kind: ResourceKind) {
        self.state.lock().unwrap().failing.insert(kind);
    }

    fn check(&self, state: &State, kind: ResourceKind) -> Result<(), StoreError> {
        if state.failing.contains(&kind) {
            return Err(StoreError::Other(anyhow::anyhow!("{} API unavailable", kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        let state = self.state.lock().unwrap();
        self.check(&state, kind)?;
        state
            .objects
            .get(&key(kind, namespace, name))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let state = self.state.lock().unwrap();
        self.check(&state, kind)?;
        Ok(state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .filter(|(_, object)| {
                let labels = object.metadata.labels.clone().unwrap_or_default();
                selector.iter().all(|(key, value)| labels.get(key) == Some(value))
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, kind)?;
        let key = key_of(kind, object);
        if state.objects.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{}/{} already exists", kind, key.2)));
        }
        let mut object = object.clone();
        state.stamp(&mut object);
        state.writes.push(format!("create {}/{}", kind, key.2));
        state.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
        resource_version: &str,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, kind)?;
        let key = key_of(kind, object);
        let current = state.objects.get(&key).ok_or(StoreError::NotFound)?;
        if current.metadata.resource_version.as_deref() != Some(resource_version) {
            return Err(StoreError::Conflict(format!(
                "{}/{} is at version {:?}, not {}",
                kind, key.2, current.metadata.resource_version, resource_version
            )));
        }
        let mut object = object.clone();
        state.stamp(&mut object);
        state.writes.push(format!("patch {}/{}", kind, key.2));
        state.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        resource_version: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, kind)?;
        let key = key(kind, namespace, name);
        let current = state.objects.get(&key).ok_or(StoreError::NotFound)?;
        if current.metadata.resource_version.as_deref() != Some(resource_version) {
            return Err(StoreError::Conflict(format!(
                "{}/{} changed since it was read",
                kind, name
            )));
        }
        state.objects.remove(&key);
        state.writes.push(format!("delete {}/{}", kind, name));
        Ok(())
    }
}
