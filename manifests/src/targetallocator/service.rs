use otel_defs::TARGET_ALLOCATOR_SERVICE_PORT;
use serde_json::json;

use super::selector;
use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::Labels;

pub(crate) const PORT_NAME: &str = "targetallocation";

pub(crate) fn render(ctx: &RenderContext, name: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(
        ResourceKind::Service,
        ComponentRole::TargetAllocator,
        &ctx.namespace,
        name,
        ctx.target_allocator_labels(name),
        Labels::new(),
        json!({
            "spec": {
                "ports": [{
                    "name": PORT_NAME,
                    "port": TARGET_ALLOCATOR_SERVICE_PORT,
                    "targetPort": "http",
                    "protocol": "TCP",
                }],
                "selector": selector(ctx, name),
            },
        }),
    )
}

pub(crate) fn render_service_account(
    ctx: &RenderContext,
    name: &str,
) -> Option<ResourceDescriptor> {
    if ctx.instance.spec.target_allocator.service_account.is_some() {
        return None;
    }
    Some(ResourceDescriptor::new(
        ResourceKind::ServiceAccount,
        ComponentRole::TargetAllocator,
        &ctx.namespace,
        name,
        ctx.target_allocator_labels(name),
        Labels::new(),
        json!({}),
    ))
}
