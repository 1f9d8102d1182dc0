use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams, Preconditions};
use kube::Client;
use otel_manifests::{Labels, ResourceKind};

use super::{selector_string, ObjectStore, StoreError};

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == 404 => StoreError::NotFound,
            kube::Error::Api(response) if response.code == 409 => {
                StoreError::Conflict(response.message)
            }
            other => StoreError::Other(other.into()),
        }
    }
}

fn namespace_of(object: &DynamicObject) -> Result<&str, StoreError> {
    object
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| {
            StoreError::Other(anyhow::anyhow!(
                "object {:?} has no namespace",
                object.metadata.name
            ))
        })
}

fn name_of(object: &DynamicObject) -> Result<&str, StoreError> {
    object
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| StoreError::Other(anyhow::anyhow!("object has no name")))
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        Ok(self.api(kind, namespace).get(name).await?)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let params = ListParams::default().labels(&selector_string(selector));
        Ok(self.api(kind, namespace).list(&params).await?.items)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let api = self.api(kind, namespace_of(object)?);
        Ok(api.create(&PostParams::default(), object).await?)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
        resource_version: &str,
    ) -> Result<DynamicObject, StoreError> {
        let api = self.api(kind, namespace_of(object)?);
        let mut object = object.clone();
        object.metadata.resource_version = Some(resource_version.to_string());
        Ok(api
            .replace(name_of(&object)?, &PostParams::default(), &object)
            .await?)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        resource_version: &str,
    ) -> Result<(), StoreError> {
        let params = DeleteParams {
            preconditions: Some(Preconditions {
                resource_version: Some(resource_version.to_string()),
                uid: None,
            }),
            ..DeleteParams::default()
        };
        self.api(kind, namespace).delete(name, &params).await?;
        Ok(())
    }
}
