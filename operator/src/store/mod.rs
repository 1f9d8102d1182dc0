mod kube_store;
#[cfg(test)]
mod memory;

use async_trait::async_trait;
use kube::api::DynamicObject;
use otel_manifests::{Labels, ResourceKind};
use thiserror::Error;

pub use kube_store::KubeStore;
#[cfg(test)]
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Versioned access to the cluster's child objects.
///
/// Writes are conditioned on `resourceVersion`: a `patch` or `delete` whose
/// expected version no longer matches the stored object fails with
/// [`StoreError::Conflict`] and leaves the object untouched.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, StoreError>;

    /// Objects of `kind` in `namespace` carrying every label of `selector`.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    async fn create(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replaces the stored object, provided it is still at `resource_version`.
    async fn patch(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
        resource_version: &str,
    ) -> Result<DynamicObject, StoreError>;

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        resource_version: &str,
    ) -> Result<(), StoreError>;

    async fn get_opt(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        match self.get(kind, namespace, name).await {
            Ok(object) => Ok(Some(object)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Renders a label map as a `k=v,k=v` selector string.
pub fn selector_string(selector: &Labels) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}
