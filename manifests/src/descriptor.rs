use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};

use crate::labels::Labels;

/// Kinds of child objects, declared in the order they are reconciled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    ConfigMap,
    ServiceAccount,
    Service,
    Deployment,
    StatefulSet,
    DaemonSet,
    Ingress,
    ServiceMonitor,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::ConfigMap,
        ResourceKind::ServiceAccount,
        ResourceKind::Service,
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Ingress,
        ResourceKind::ServiceMonitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Service => "Service",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::ServiceMonitor => "ServiceMonitor",
        }
    }

    fn group_version(&self) -> (&'static str, &'static str) {
        match self {
            ResourceKind::ConfigMap | ResourceKind::ServiceAccount | ResourceKind::Service => {
                ("", "v1")
            }
            ResourceKind::Deployment | ResourceKind::StatefulSet | ResourceKind::DaemonSet => {
                ("apps", "v1")
            }
            ResourceKind::Ingress => ("networking.k8s.io", "v1"),
            ResourceKind::ServiceMonitor => ("monitoring.coreos.com", "v1"),
        }
    }

    pub fn api_version(&self) -> String {
        match self.group_version() {
            ("", version) => version.to_string(),
            (group, version) => format!("{}/{}", group, version),
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::ServiceAccount => "serviceaccounts",
            ResourceKind::Service => "services",
            ResourceKind::Deployment => "deployments",
            ResourceKind::StatefulSet => "statefulsets",
            ResourceKind::DaemonSet => "daemonsets",
            ResourceKind::Ingress => "ingresses",
            ResourceKind::ServiceMonitor => "servicemonitors",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let (group, version) = self.group_version();
        let gvk = GroupVersionKind::gvk(group, version, self.as_str());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    Collector,
    TargetAllocator,
    Monitoring,
}

impl ComponentRole {
    pub fn label_value(&self) -> &'static str {
        match self {
            ComponentRole::Collector => "opentelemetry-collector",
            ComponentRole::TargetAllocator => "opentelemetry-targetallocator",
            ComponentRole::Monitoring => "opentelemetry-collector-monitoring",
        }
    }
}

/// One desired child object: its kind, the role it plays and the full body.
#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub role: ComponentRole,
    pub object: DynamicObject,
}

impl ResourceDescriptor {
    /// `body` holds every top level field besides `apiVersion`, `kind` and `metadata`.
    pub fn new(
        kind: ResourceKind,
        role: ComponentRole,
        namespace: &str,
        name: &str,
        labels: Labels,
        annotations: Labels,
        body: serde_json::Value,
    ) -> Self {
        let metadata = ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: if annotations.is_empty() {
                None
            } else {
                Some(annotations)
            },
            ..Default::default()
        };
        let object = DynamicObject {
            types: Some(TypeMeta {
                api_version: kind.api_version(),
                kind: kind.as_str().to_string(),
            }),
            metadata,
            data: body,
        };
        Self { kind, role, object }
    }

    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.object.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn labels(&self) -> Option<&Labels> {
        self.object.metadata.labels.as_ref()
    }

    pub fn annotations(&self) -> Option<&Labels> {
        self.object.metadata.annotations.as_ref()
    }

    /// Looks up a field of the body with a JSON pointer such as `/spec/replicas`.
    pub fn field(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.object.data.pointer(pointer)
    }
}
