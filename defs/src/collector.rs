use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of one OpenTelemetry collector instance.
///
/// ```yaml
/// apiVersion: opentelemetry.io/v1alpha1
/// kind: OpenTelemetryCollector
/// metadata:
///   name: simplest
/// spec:
///   mode: deployment
///   config: |
///     receivers:
///       otlp:
///         protocols:
///           grpc:
///     exporters:
///       logging:
///     service:
///       pipelines:
///         traces:
///           receivers: [otlp]
///           exporters: [logging]
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "opentelemetry.io",
    version = "v1alpha1",
    kind = "OpenTelemetryCollector",
    plural = "opentelemetrycollectors",
    shortname = "otelcol",
    status = "OpenTelemetryCollectorStatus",
    derive = "PartialEq",
    namespaced,
    printcolumn = r#"{"name":"Mode", "type":"string", "jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryCollectorSpec {
    #[serde(default)]
    pub mode: Mode,

    /// Raw collector configuration, YAML.
    #[serde(default)]
    pub config: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Existing service account to run the collector with. When unset one is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    #[serde(default)]
    pub upgrade_strategy: UpgradeStrategy,

    #[serde(default)]
    pub target_allocator: TargetAllocatorSpec,

    #[serde(default)]
    pub ingress: IngressSpec,

    /// Ports exposed in addition to the ones derived from the receivers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_annotations: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Deployment,
    StatefulSet,
    DaemonSet,
    Sidecar,
    Standalone,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStrategy {
    #[default]
    Automatic,
    None,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetAllocatorSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub allocation_strategy: AllocationStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    #[serde(default, rename = "prometheusCR")]
    pub prometheus_cr: PrometheusCrSpec,

    #[serde(default)]
    pub observability: ObservabilitySpec,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStrategy {
    #[default]
    LeastWeighted,
    ConsistentHashing,
    PerNode,
}

impl AllocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStrategy::LeastWeighted => "least-weighted",
            AllocationStrategy::ConsistentHashing => "consistent-hashing",
            AllocationStrategy::PerNode => "per-node",
        }
    }

    /// Whether targets are partitioned across collector replicas (as opposed to nodes).
    pub fn is_per_replica(&self) -> bool {
        !matches!(self, AllocationStrategy::PerNode)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusCrSpec {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilitySpec {
    #[serde(default)]
    pub metrics: MetricsConfigSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfigSpec {
    #[serde(default)]
    pub enable_metrics: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<IngressType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngressType {
    Ingress,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub name: String,
    pub port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryCollectorStatus {
    /// Last upgrade step applied to this instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Collector image the managed workload was last rendered with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OpenTelemetryCollector {
    /// Version recorded by the last successful upgrade, if any.
    pub fn stored_version(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.version.as_deref())
    }

    pub fn status_image(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.image.as_deref())
    }
}
