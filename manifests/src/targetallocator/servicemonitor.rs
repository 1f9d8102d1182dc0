use serde_json::json;

use super::{selector, service::PORT_NAME};
use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::Labels;

/// Scrape definition for the allocator's own metrics. Needs the prometheus
/// operator API and metrics enabled on the instance.
pub(crate) fn render(ctx: &RenderContext, name: &str) -> Option<ResourceDescriptor> {
    let enabled = ctx
        .instance
        .spec
        .target_allocator
        .observability
        .metrics
        .enable_metrics;
    if !enabled || !ctx.features.prometheus_operator {
        return None;
    }

    Some(ResourceDescriptor::new(
        ResourceKind::ServiceMonitor,
        ComponentRole::TargetAllocator,
        &ctx.namespace,
        name,
        ctx.target_allocator_labels(name),
        Labels::new(),
        json!({
            "spec": {
                "endpoints": [{ "port": PORT_NAME }],
                "namespaceSelector": { "matchNames": [ctx.namespace] },
                "selector": { "matchLabels": selector(ctx, name) },
            },
        }),
    ))
}
