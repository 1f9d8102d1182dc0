use otel_defs::{LABEL_HEADLESS_SERVICE, METRICS_PORT};
use serde_json::{json, Value};

use super::workload::WorkloadKind;
use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::{self, Labels};
use crate::naming;

fn service_ports(ctx: &RenderContext) -> Vec<Value> {
    ctx.ports
        .iter()
        .map(|p| json!({ "name": p.name, "port": p.port, "protocol": p.protocol_or_default() }))
        .collect()
}

/// Service exposing every derived port. Nothing is rendered without ports.
pub(crate) fn render(ctx: &RenderContext) -> Option<ResourceDescriptor> {
    if ctx.ports.is_empty() {
        return None;
    }
    let name = naming::collector(&ctx.name);
    Some(ResourceDescriptor::new(
        ResourceKind::Service,
        ComponentRole::Collector,
        &ctx.namespace,
        &name,
        ctx.labels(&name, ComponentRole::Collector),
        Labels::new(),
        json!({
            "spec": {
                "ports": service_ports(ctx),
                "selector": labels::selector(ctx.instance, ComponentRole::Collector),
                "internalTrafficPolicy": "Cluster",
            },
        }),
    ))
}

/// Headless variant giving StatefulSet replicas stable network identities.
pub(crate) fn render_headless(ctx: &RenderContext) -> Option<ResourceDescriptor> {
    if ctx.workload != WorkloadKind::StatefulSet {
        return None;
    }
    let name = naming::headless_service(&ctx.name);
    let mut labels = ctx.labels(&naming::collector(&ctx.name), ComponentRole::Collector);
    labels.insert(LABEL_HEADLESS_SERVICE.to_string(), "Exists".to_string());

    let mut ports = service_ports(ctx);
    if ports.is_empty() {
        ports.push(json!({ "name": "metrics", "port": METRICS_PORT, "protocol": "TCP" }));
    }

    Some(ResourceDescriptor::new(
        ResourceKind::Service,
        ComponentRole::Collector,
        &ctx.namespace,
        &name,
        labels,
        Labels::new(),
        json!({
            "spec": {
                "ports": ports,
                "selector": labels::selector(ctx.instance, ComponentRole::Collector),
                "clusterIP": "None",
                "internalTrafficPolicy": "Cluster",
            },
        }),
    ))
}

pub(crate) fn render_monitoring(ctx: &RenderContext) -> ResourceDescriptor {
    let name = naming::monitoring_service(&ctx.name);
    ResourceDescriptor::new(
        ResourceKind::Service,
        ComponentRole::Monitoring,
        &ctx.namespace,
        &name,
        ctx.labels(&name, ComponentRole::Monitoring),
        Labels::new(),
        json!({
            "spec": {
                "ports": [{ "name": "monitoring", "port": METRICS_PORT, "protocol": "TCP" }],
                "selector": labels::selector(ctx.instance, ComponentRole::Collector),
            },
        }),
    )
}
