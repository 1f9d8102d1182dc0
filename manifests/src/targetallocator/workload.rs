use otel_defs::{ANNOTATION_TA_CONFIG_HASH, TARGET_ALLOCATOR_CONTAINER_PORT};
use serde_json::json;

use super::selector;
use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::Labels;

const CONTAINER_NAME: &str = "ta-container";
const CONFIG_VOLUME: &str = "ta-internal";
const CONFIG_MOUNT_PATH: &str = "/conf";

pub(crate) fn service_account_name(ctx: &RenderContext, name: &str) -> String {
    ctx.instance
        .spec
        .target_allocator
        .service_account
        .clone()
        .unwrap_or_else(|| name.to_string())
}

fn probe(path: &str) -> serde_json::Value {
    json!({ "httpGet": { "path": path, "port": TARGET_ALLOCATOR_CONTAINER_PORT } })
}

pub(crate) fn render(ctx: &RenderContext, name: &str, config_hash: &str) -> ResourceDescriptor {
    let spec = &ctx.instance.spec.target_allocator;
    let entry = &ctx.config.target_allocator_config_map_entry;
    let labels = ctx.target_allocator_labels(name);

    let args: Vec<&str> = if spec.prometheus_cr.enabled {
        vec!["--enable-prometheus-cr-watcher"]
    } else {
        Vec::new()
    };

    let container = json!({
        "name": CONTAINER_NAME,
        "image": ctx.target_allocator_image(),
        "args": args,
        "env": [{
            "name": "OTELCOL_NAMESPACE",
            "valueFrom": { "fieldRef": { "fieldPath": "metadata.namespace" } },
        }],
        "ports": [{
            "name": "http",
            "containerPort": TARGET_ALLOCATOR_CONTAINER_PORT,
            "protocol": "TCP",
        }],
        "volumeMounts": [{ "name": CONFIG_VOLUME, "mountPath": CONFIG_MOUNT_PATH }],
        "livenessProbe": probe("/livez"),
        "readinessProbe": probe("/readyz"),
    });

    let pod_annotations = Labels::from([(
        ANNOTATION_TA_CONFIG_HASH.to_string(),
        config_hash.to_string(),
    )]);

    ResourceDescriptor::new(
        ResourceKind::Deployment,
        ComponentRole::TargetAllocator,
        &ctx.namespace,
        name,
        labels.clone(),
        Labels::new(),
        json!({
            "spec": {
                "replicas": spec.replicas.unwrap_or(1),
                "selector": { "matchLabels": selector(ctx, name) },
                "template": {
                    "metadata": { "labels": labels, "annotations": pod_annotations },
                    "spec": {
                        "serviceAccountName": service_account_name(ctx, name),
                        "containers": [container],
                        "volumes": [{
                            "name": CONFIG_VOLUME,
                            "configMap": {
                                "name": name,
                                "items": [{ "key": entry, "path": entry }],
                            },
                        }],
                    },
                },
            },
        }),
    )
}
