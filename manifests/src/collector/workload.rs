use otel_defs::{Mode, OpenTelemetryCollectorSpec, ANNOTATION_CONFIG_HASH, METRICS_PORT};
use serde_json::{json, Value};

use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::{self, Labels};
use crate::naming;

const CONTAINER_NAME: &str = "otc-container";
const CONFIG_VOLUME: &str = "otc-internal";
const CONFIG_MOUNT_PATH: &str = "/conf";
const POD_INDEX_FIELD: &str = "metadata.labels['apps.kubernetes.io/pod-index']";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    /// Injected into application pods, nothing is rendered for it.
    Sidecar,
}

impl WorkloadKind {
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            WorkloadKind::Deployment => Some(ResourceKind::Deployment),
            WorkloadKind::StatefulSet => Some(ResourceKind::StatefulSet),
            WorkloadKind::DaemonSet => Some(ResourceKind::DaemonSet),
            WorkloadKind::Sidecar => None,
        }
    }
}

/// Picks the workload from the mode and whether targets are sharded per replica.
pub fn workload_kind(spec: &OpenTelemetryCollectorSpec) -> WorkloadKind {
    let sharded = spec.target_allocator.enabled
        && spec.target_allocator.allocation_strategy.is_per_replica();
    match spec.mode {
        Mode::Sidecar => WorkloadKind::Sidecar,
        Mode::DaemonSet => WorkloadKind::DaemonSet,
        Mode::StatefulSet => WorkloadKind::StatefulSet,
        Mode::Deployment | Mode::Standalone if sharded => WorkloadKind::StatefulSet,
        Mode::Deployment | Mode::Standalone => WorkloadKind::Deployment,
    }
}

pub(crate) fn service_account_name(ctx: &RenderContext) -> String {
    ctx.instance
        .spec
        .service_account
        .clone()
        .unwrap_or_else(|| naming::collector(&ctx.name))
}

pub(crate) fn annotations(ctx: &RenderContext) -> Labels {
    Labels::from([
        (ANNOTATION_CONFIG_HASH.to_string(), ctx.config_hash.clone()),
        ("prometheus.io/scrape".to_string(), "true".to_string()),
        ("prometheus.io/port".to_string(), METRICS_PORT.to_string()),
        ("prometheus.io/path".to_string(), "/metrics".to_string()),
    ])
}

fn replicas(ctx: &RenderContext) -> i32 {
    match ctx.instance.spec.mode {
        Mode::Standalone => 1,
        _ => ctx.instance.spec.replicas.unwrap_or(1),
    }
}

fn sharded(ctx: &RenderContext) -> bool {
    ctx.workload == WorkloadKind::StatefulSet
        && ctx.target_allocator_enabled()
        && ctx.instance.spec.target_allocator.allocation_strategy.is_per_replica()
}

fn container(ctx: &RenderContext) -> Value {
    let entry = &ctx.config.collector_config_map_entry;

    let mut ports: Vec<Value> = ctx
        .ports
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "containerPort": p.port,
                "protocol": p.protocol_or_default(),
            })
        })
        .collect();
    ports.push(json!({ "name": "metrics", "containerPort": METRICS_PORT, "protocol": "TCP" }));

    let mut env = vec![json!({
        "name": "POD_NAME",
        "valueFrom": { "fieldRef": { "fieldPath": "metadata.name" } }
    })];
    if sharded(ctx) {
        env.push(json!({
            "name": "SHARD",
            "valueFrom": { "fieldRef": { "fieldPath": POD_INDEX_FIELD } }
        }));
    }

    json!({
        "name": CONTAINER_NAME,
        "image": ctx.collector_image,
        "args": [format!("--config={}/{}", CONFIG_MOUNT_PATH, entry)],
        "ports": ports,
        "env": env,
        "volumeMounts": [{ "name": CONFIG_VOLUME, "mountPath": CONFIG_MOUNT_PATH }],
    })
}

fn pod_template(ctx: &RenderContext, labels: &Labels) -> Value {
    let entry = &ctx.config.collector_config_map_entry;

    let mut pod_annotations = ctx.instance.spec.pod_annotations.clone();
    pod_annotations.extend(annotations(ctx));

    json!({
        "metadata": { "labels": labels, "annotations": pod_annotations },
        "spec": {
            "serviceAccountName": service_account_name(ctx),
            "containers": [container(ctx)],
            "volumes": [{
                "name": CONFIG_VOLUME,
                "configMap": {
                    "name": naming::collector(&ctx.name),
                    "items": [{ "key": entry, "path": entry }],
                },
            }],
            "dnsPolicy": "ClusterFirst",
        },
    })
}

/// The collector's workload object, `None` in sidecar mode.
pub(crate) fn render(ctx: &RenderContext) -> Option<ResourceDescriptor> {
    let kind = ctx.workload.resource_kind()?;
    let name = naming::collector(&ctx.name);
    let labels = ctx.labels(&name, ComponentRole::Collector);
    let selector = labels::selector(ctx.instance, ComponentRole::Collector);
    let template = pod_template(ctx, &labels);

    let spec = match ctx.workload {
        WorkloadKind::Deployment => json!({
            "replicas": replicas(ctx),
            "selector": { "matchLabels": selector },
            "template": template,
        }),
        WorkloadKind::StatefulSet => json!({
            "replicas": replicas(ctx),
            "serviceName": naming::headless_service(&ctx.name),
            "podManagementPolicy": "Parallel",
            "selector": { "matchLabels": selector },
            "template": template,
        }),
        WorkloadKind::DaemonSet | WorkloadKind::Sidecar => json!({
            "selector": { "matchLabels": selector },
            "template": template,
        }),
    };

    Some(ResourceDescriptor::new(
        kind,
        ComponentRole::Collector,
        &ctx.namespace,
        &name,
        labels,
        annotations(ctx),
        json!({ "spec": spec }),
    ))
}
