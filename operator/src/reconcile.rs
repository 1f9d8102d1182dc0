use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use log::{debug, info};
use otel_defs::OpenTelemetryCollector;
use otel_manifests::{
    build_all, ownership_labels, ClusterFeatures, Labels, ManifestConfig, ResourceDescriptor,
    ResourceKind,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::{KindFailure, ReconcileError};
use crate::store::{ObjectStore, StoreError};

/// What one kind's reconcile did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindSummary {
    pub created: usize,
    pub patched: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl KindSummary {
    pub fn writes(&self) -> usize {
        self.created + self.patched + self.deleted
    }
}

pub type PassSummary = BTreeMap<ResourceKind, KindSummary>;

/// Kinds a pass reconciles given the cluster's capabilities, in order.
pub fn kinds_for(features: ClusterFeatures) -> Vec<ResourceKind> {
    ResourceKind::ALL
        .into_iter()
        .filter(|kind| *kind != ResourceKind::ServiceMonitor || features.prometheus_operator)
        .collect()
}

/// Merges `desired` into `live`. Maps merge key by key so fields the builder
/// never sets survive. Lists and scalars are replaced by `desired`, so entries
/// and fields dropped from a list element do not linger.
pub fn deep_merge(live: &mut Value, desired: &Value) {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => {
            for (key, value) in desired {
                match live.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        live.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (live, desired) => *live = desired.clone(),
    }
}

fn merge_string_map(live: &mut Option<Labels>, desired: Option<&Labels>) {
    let Some(desired) = desired else {
        return;
    };
    let merged = live.get_or_insert_with(Labels::new);
    for (key, value) in desired {
        merged.insert(key.clone(), value.clone());
    }
}

fn attach_owner(object: &mut DynamicObject, owner: Option<&OwnerReference>) {
    let Some(owner) = owner else {
        return;
    };
    let references = object.metadata.owner_references.get_or_insert_with(Vec::new);
    references.retain(|reference| reference.uid != owner.uid && reference.controller != Some(true));
    references.push(owner.clone());
}

/// The live object with every field the builder controls taken from `desired`.
pub fn merge_object(
    live: &DynamicObject,
    desired: &DynamicObject,
    owner: Option<&OwnerReference>,
) -> DynamicObject {
    let mut merged = live.clone();
    deep_merge(&mut merged.data, &desired.data);
    merge_string_map(&mut merged.metadata.labels, desired.metadata.labels.as_ref());
    merge_string_map(&mut merged.metadata.annotations, desired.metadata.annotations.as_ref());
    attach_owner(&mut merged, owner);
    merged
}

fn same_content(live: &DynamicObject, merged: &DynamicObject) -> bool {
    live.data == merged.data
        && live.metadata.labels == merged.metadata.labels
        && live.metadata.annotations == merged.metadata.annotations
        && live.metadata.owner_references == merged.metadata.owner_references
}

/// Runs one store call unless the pass is cancelled first.
async fn guarded<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, ReconcileError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        result = call => result.map_err(ReconcileError::from),
    }
}

/// Converges the live objects of one kind onto the descriptors of that kind in
/// `desired`, deleting owned objects that are no longer desired.
pub async fn reconcile_kind(
    store: &dyn ObjectStore,
    instance: &OpenTelemetryCollector,
    kind: ResourceKind,
    desired: &[ResourceDescriptor],
    cancel: &CancellationToken,
) -> Result<KindSummary, ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();
    let selector = ownership_labels(instance);
    let owner = instance.controller_owner_ref(&());
    let mut summary = KindSummary::default();

    let live = guarded(cancel, store.list(kind, &namespace, &selector)).await?;

    let mut wanted = BTreeSet::new();
    for descriptor in desired.iter().filter(|descriptor| descriptor.kind == kind) {
        let name = descriptor.name();
        wanted.insert(name.to_string());

        match guarded(cancel, store.get_opt(kind, descriptor.namespace(), name)).await? {
            None => {
                let mut object = descriptor.object.clone();
                attach_owner(&mut object, owner.as_ref());
                guarded(cancel, store.create(kind, &object)).await?;
                info!("Created {} {}/{}", kind, descriptor.namespace(), name);
                summary.created += 1;
            }
            Some(existing) => {
                let merged = merge_object(&existing, &descriptor.object, owner.as_ref());
                if same_content(&existing, &merged) {
                    debug!("{} {}/{} is up to date", kind, descriptor.namespace(), name);
                    summary.unchanged += 1;
                    continue;
                }
                let version = existing.metadata.resource_version.clone().unwrap_or_default();
                guarded(cancel, store.patch(kind, &merged, &version)).await?;
                info!("Patched {} {}/{}", kind, descriptor.namespace(), name);
                summary.patched += 1;
            }
        }
    }

    for object in live {
        let name = object.name_any();
        if wanted.contains(&name) {
            continue;
        }
        let version = object.metadata.resource_version.clone().unwrap_or_default();
        match guarded(cancel, store.delete(kind, &namespace, &name, &version)).await {
            Ok(()) => {
                info!("Deleted {} {}/{}", kind, namespace, name);
                summary.deleted += 1;
            }
            Err(ReconcileError::Store(StoreError::NotFound)) => {
                debug!("{} {}/{} was already gone", kind, namespace, name);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}

/// Reconciles every kind in `kinds`, in order. A failing kind does not stop the
/// others; cancellation does.
pub async fn reconcile_all(
    store: &dyn ObjectStore,
    instance: &OpenTelemetryCollector,
    desired: &[ResourceDescriptor],
    kinds: &[ResourceKind],
    cancel: &CancellationToken,
) -> Result<PassSummary, ReconcileError> {
    let mut summaries = PassSummary::new();
    let mut failures = Vec::new();

    for &kind in kinds {
        match reconcile_kind(store, instance, kind, desired, cancel).await {
            Ok(summary) => {
                summaries.insert(kind, summary);
            }
            Err(ReconcileError::Cancelled) => return Err(ReconcileError::Cancelled),
            Err(error) => failures.push(KindFailure { kind, error }),
        }
    }

    if failures.is_empty() {
        Ok(summaries)
    } else {
        Err(ReconcileError::Kinds(failures))
    }
}

/// Renders the desired objects of `instance` and converges the store onto them.
pub async fn reconcile_instance(
    store: &dyn ObjectStore,
    instance: &OpenTelemetryCollector,
    config: &ManifestConfig,
    features: ClusterFeatures,
    cancel: &CancellationToken,
) -> Result<PassSummary, ReconcileError> {
    let desired = build_all(instance, config, features)?;
    debug!("{} desired objects for {}", desired.len(), instance.name_any());
    reconcile_all(store, instance, &desired, &kinds_for(features), cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use otel_defs::{IngressType, Mode, OpenTelemetryCollectorSpec};
    use otel_manifests::ComponentRole;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const CONFIG: &str = r#"receivers:
  examplereceiver:
    endpoint: "0.0.0.0:12345"
exporters:
  logging:
service:
  pipelines:
    metrics:
      receivers: [examplereceiver]
      exporters: [logging]
"#;

    fn instance() -> OpenTelemetryCollector {
        let mut instance = OpenTelemetryCollector::new(
            "simplest",
            OpenTelemetryCollectorSpec {
                mode: Mode::Deployment,
                config: CONFIG.to_string(),
                ..Default::default()
            },
        );
        instance.metadata.namespace = Some("default".to_string());
        instance.metadata.uid = Some("0b6c2f0e-uid".to_string());
        instance
    }

    fn service(instance: &OpenTelemetryCollector, name: &str, port: i64) -> ResourceDescriptor {
        ResourceDescriptor::new(
            ResourceKind::Service,
            ComponentRole::Collector,
            "default",
            name,
            ownership_labels(instance),
            Labels::new(),
            json!({ "spec": { "ports": [{ "name": "http", "port": port }] } }),
        )
    }

    async fn pass(
        store: &MemoryStore,
        instance: &OpenTelemetryCollector,
        cancel: &CancellationToken,
    ) -> Result<PassSummary, ReconcileError> {
        reconcile_instance(
            store,
            instance,
            &ManifestConfig::default(),
            ClusterFeatures::default(),
            cancel,
        )
        .await
    }

    #[test]
    fn test_deep_merge() {
        let mut live = json!({
            "spec": {
                "clusterIP": "10.0.0.1",
                "ports": [{ "name": "a", "port": 1, "targetPort": 1 }],
                "selector": { "x": "1" },
            },
            "status": { "loadBalancer": {} },
        });
        let desired = json!({
            "spec": {
                "ports": [{ "name": "a", "port": 2 }],
                "selector": { "y": "2" },
            },
        });
        deep_merge(&mut live, &desired);
        assert_eq!(
            live,
            json!({
                "spec": {
                    "clusterIP": "10.0.0.1",
                    "ports": [{ "name": "a", "port": 2 }],
                    "selector": { "x": "1", "y": "2" },
                },
                "status": { "loadBalancer": {} },
            })
        );

        let mut live = json!({ "ports": [1, 2, 3] });
        deep_merge(&mut live, &json!({ "ports": [4] }));
        assert_eq!(live, json!({ "ports": [4] }));
    }

    #[tokio::test]
    async fn test_first_pass_creates_every_object() {
        let store = MemoryStore::new();
        let instance = instance();
        let summary = pass(&store, &instance, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            store.writes(),
            vec![
                "create ConfigMap/simplest-collector",
                "create ServiceAccount/simplest-collector",
                "create Service/simplest-collector",
                "create Service/simplest-collector-monitoring",
                "create Deployment/simplest-collector",
            ]
        );
        assert_eq!(summary[&ResourceKind::Service].created, 2);
        assert!(!summary.contains_key(&ResourceKind::ServiceMonitor));

        let deployment = store
            .object(ResourceKind::Deployment, "default", "simplest-collector")
            .unwrap();
        let owners = deployment.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "0b6c2f0e-uid");
        assert_eq!(owners[0].kind, "OpenTelemetryCollector");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[tokio::test]
    async fn test_converged_pass_writes_nothing() {
        let store = MemoryStore::new();
        let instance = instance();
        let cancel = CancellationToken::new();
        pass(&store, &instance, &cancel).await.unwrap();
        store.clear_writes();

        let summary = pass(&store, &instance, &cancel).await.unwrap();
        assert_eq!(store.writes(), Vec::<String>::new());
        assert!(summary.values().all(|kind| kind.writes() == 0));
        assert_eq!(summary[&ResourceKind::Service].unchanged, 2);
    }

    #[tokio::test]
    async fn test_config_change_patches_in_place() {
        let store = MemoryStore::new();
        let mut instance = instance();
        let cancel = CancellationToken::new();
        pass(&store, &instance, &cancel).await.unwrap();
        store.clear_writes();

        instance.spec.config = CONFIG.replace("12345", "23456");
        pass(&store, &instance, &cancel).await.unwrap();
        assert_eq!(
            store.writes(),
            vec![
                "patch ConfigMap/simplest-collector",
                "patch Service/simplest-collector",
                "patch Deployment/simplest-collector",
            ]
        );
    }

    #[tokio::test]
    async fn test_orphans_are_garbage_collected() {
        let store = MemoryStore::new();
        let instance = instance();
        let cancel = CancellationToken::new();

        for name in ["a", "b", "c"] {
            store.insert(ResourceKind::Service, service(&instance, name, 80).object);
        }
        let mut foreign = service(&instance, "foreign", 80).object;
        foreign.metadata.labels = Some(Labels::from([("app".to_string(), "other".to_string())]));
        store.insert(ResourceKind::Service, foreign);

        let desired = vec![service(&instance, "a", 80), service(&instance, "c", 80)];
        let summary = reconcile_kind(&store, &instance, ResourceKind::Service, &desired, &cancel)
            .await
            .unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(store.names(ResourceKind::Service), vec!["a", "c", "foreign"]);
        assert!(store.writes().contains(&"delete Service/b".to_string()));
    }

    #[tokio::test]
    async fn test_fields_not_owned_are_preserved() {
        let store = MemoryStore::new();
        let instance = instance();
        let mut live = service(&instance, "a", 80).object;
        live.metadata
            .labels
            .get_or_insert_with(Labels::new)
            .insert("team".to_string(), "obs".to_string());
        live.data = json!({
            "spec": { "clusterIP": "10.0.0.1", "ports": [{ "name": "http", "port": 80 }] },
            "status": { "loadBalancer": {} },
        });
        store.insert(ResourceKind::Service, live);

        let desired = vec![service(&instance, "a", 8080)];
        let cancel = CancellationToken::new();
        let summary = reconcile_kind(&store, &instance, ResourceKind::Service, &desired, &cancel)
            .await
            .unwrap();
        assert_eq!(summary.patched, 1);

        let stored = store.object(ResourceKind::Service, "default", "a").unwrap();
        assert_eq!(
            stored.data,
            json!({
                "spec": { "clusterIP": "10.0.0.1", "ports": [{ "name": "http", "port": 8080 }] },
                "status": { "loadBalancer": {} },
            })
        );
        let labels = stored.metadata.labels.unwrap();
        assert_eq!(labels.get("team").map(String::as_str), Some("obs"));
        assert_eq!(
            labels.get("app.kubernetes.io/managed-by").map(String::as_str),
            Some("opentelemetry-operator")
        );
    }

    fn desired_field<'a>(
        desired: &'a [ResourceDescriptor],
        kind: ResourceKind,
        pointer: &str,
    ) -> &'a Value {
        desired
            .iter()
            .find(|descriptor| descriptor.kind == kind)
            .and_then(|descriptor| descriptor.object.data.pointer(pointer))
            .unwrap()
    }

    fn live_field(store: &MemoryStore, kind: ResourceKind, name: &str, pointer: &str) -> Value {
        let object = store.object(kind, "default", name).unwrap();
        object.data.pointer(pointer).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_changed_protocol_replaces_ports() {
        let store = MemoryStore::new();
        let mut instance = instance();
        let cancel = CancellationToken::new();
        instance.spec.config = "receivers:\n  statsd:\n".to_string();
        pass(&store, &instance, &cancel).await.unwrap();
        assert_eq!(
            live_field(&store, ResourceKind::Service, "simplest-collector", "/spec/ports"),
            json!([{ "name": "statsd", "port": 8125, "protocol": "UDP" }])
        );

        instance.spec.config = "receivers:\n  carbon:\n".to_string();
        pass(&store, &instance, &cancel).await.unwrap();

        let desired =
            build_all(&instance, &ManifestConfig::default(), ClusterFeatures::default()).unwrap();
        let container_ports = "/spec/template/spec/containers/0/ports";
        assert_eq!(
            live_field(&store, ResourceKind::Deployment, "simplest-collector", container_ports),
            *desired_field(&desired, ResourceKind::Deployment, container_ports)
        );
        assert_eq!(
            live_field(&store, ResourceKind::Service, "simplest-collector", "/spec/ports"),
            json!([{ "name": "carbon", "port": 2003, "protocol": "TCP" }])
        );

        store.clear_writes();
        pass(&store, &instance, &cancel).await.unwrap();
        assert_eq!(store.writes(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_removed_ingress_host_is_dropped() {
        let store = MemoryStore::new();
        let mut instance = instance();
        let cancel = CancellationToken::new();
        instance.spec.ingress.type_ = Some(IngressType::Ingress);
        instance.spec.ingress.hostname = Some("old.example.com".to_string());
        pass(&store, &instance, &cancel).await.unwrap();

        let name = store.names(ResourceKind::Ingress).pop().unwrap();
        assert_eq!(
            live_field(&store, ResourceKind::Ingress, &name, "/spec/rules/0/host"),
            json!("old.example.com")
        );

        instance.spec.ingress.hostname = None;
        store.clear_writes();
        pass(&store, &instance, &cancel).await.unwrap();
        assert_eq!(store.writes(), vec![format!("patch Ingress/{}", name)]);

        let desired =
            build_all(&instance, &ManifestConfig::default(), ClusterFeatures::default()).unwrap();
        let rules = live_field(&store, ResourceKind::Ingress, &name, "/spec/rules");
        assert_eq!(rules, *desired_field(&desired, ResourceKind::Ingress, "/spec/rules"));
        assert_eq!(rules.pointer("/0/host"), None);
    }

    #[tokio::test]
    async fn test_dropped_list_field_is_removed() {
        let store = MemoryStore::new();
        let instance = instance();
        let mut live = service(&instance, "a", 80).object;
        live.data = json!({
            "spec": {
                "clusterIP": "10.0.0.1",
                "ports": [{ "name": "http", "port": 80, "protocol": "UDP", "nodePort": 30080 }],
            },
        });
        store.insert(ResourceKind::Service, live);

        let desired = vec![service(&instance, "a", 80)];
        let cancel = CancellationToken::new();
        let summary = reconcile_kind(&store, &instance, ResourceKind::Service, &desired, &cancel)
            .await
            .unwrap();
        assert_eq!(summary.patched, 1);
        assert_eq!(
            store.object(ResourceKind::Service, "default", "a").unwrap().data,
            json!({
                "spec": { "clusterIP": "10.0.0.1", "ports": [{ "name": "http", "port": 80 }] },
            })
        );
    }

    /// Bumps the stored version right before every patch, like a concurrent writer.
    struct Interfering {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ObjectStore for Interfering {
        async fn get(
            &self,
            kind: ResourceKind,
            namespace: &str,
            name: &str,
        ) -> Result<DynamicObject, StoreError> {
            self.inner.get(kind, namespace, name).await
        }

        async fn list(
            &self,
            kind: ResourceKind,
            namespace: &str,
            selector: &Labels,
        ) -> Result<Vec<DynamicObject>, StoreError> {
            self.inner.list(kind, namespace, selector).await
        }

        async fn create(
            &self,
            kind: ResourceKind,
            object: &DynamicObject,
        ) -> Result<DynamicObject, StoreError> {
            self.inner.create(kind, object).await
        }

        async fn patch(
            &self,
            kind: ResourceKind,
            object: &DynamicObject,
            resource_version: &str,
        ) -> Result<DynamicObject, StoreError> {
            let namespace = object.metadata.namespace.clone().unwrap();
            let name = object.metadata.name.clone().unwrap();
            let current = self.inner.object(kind, &namespace, &name).unwrap();
            self.inner.insert(kind, current);
            self.inner.patch(kind, object, resource_version).await
        }

        async fn delete(
            &self,
            kind: ResourceKind,
            namespace: &str,
            name: &str,
            resource_version: &str,
        ) -> Result<(), StoreError> {
            self.inner.delete(kind, namespace, name, resource_version).await
        }
    }

    #[tokio::test]
    async fn test_stale_patch_is_rejected() {
        let store = Interfering { inner: MemoryStore::new() };
        let instance = instance();
        store.inner.insert(ResourceKind::Service, service(&instance, "a", 80).object);

        let desired = vec![service(&instance, "a", 8080)];
        let cancel = CancellationToken::new();
        let error = reconcile_kind(&store, &instance, ResourceKind::Service, &desired, &cancel)
            .await
            .unwrap_err();
        assert!(error.is_conflict());

        let stored = store.inner.object(ResourceKind::Service, "default", "a").unwrap();
        assert_eq!(stored.data.pointer("/spec/ports/0/port"), Some(&json!(80)));
        assert_eq!(store.inner.writes(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_cancelled_pass_writes_nothing() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = pass(&store, &instance(), &cancel).await.unwrap_err();
        assert!(matches!(error, ReconcileError::Cancelled));
        assert_eq!(store.writes(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_failing_kind_does_not_stop_others() {
        let store = MemoryStore::new();
        store.fail_kind(ResourceKind::Service);

        let error = pass(&store, &instance(), &CancellationToken::new()).await.unwrap_err();
        match &error {
            ReconcileError::Kinds(failures) => {
                let kinds: Vec<ResourceKind> =
                    failures.iter().map(|failure| failure.kind).collect();
                assert_eq!(kinds, vec![ResourceKind::Service]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!error.is_conflict());
        assert_eq!(
            store.writes(),
            vec![
                "create ConfigMap/simplest-collector",
                "create ServiceAccount/simplest-collector",
                "create Deployment/simplest-collector",
            ]
        );
    }

    #[tokio::test]
    async fn test_service_monitor_kind_follows_capability() {
        let store = MemoryStore::new();
        store.fail_kind(ResourceKind::ServiceMonitor);
        assert!(pass(&store, &instance(), &CancellationToken::new()).await.is_ok());

        assert_eq!(kinds_for(ClusterFeatures::default()).len(), 7);
        assert_eq!(
            kinds_for(ClusterFeatures { prometheus_operator: true }).last(),
            Some(&ResourceKind::ServiceMonitor)
        );
    }

    #[tokio::test]
    async fn test_malformed_config_fails_before_any_write() {
        let store = MemoryStore::new();
        let mut instance = instance();
        instance.spec.config = "receivers: [unclosed".to_string();

        let error = pass(&store, &instance, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(error, ReconcileError::Build(_)));
        assert_eq!(store.writes(), Vec::<String>::new());
    }
}
