use serde_json::json;

use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::Labels;
use crate::naming;

pub(crate) fn render(ctx: &RenderContext) -> Option<ResourceDescriptor> {
    if ctx.instance.spec.service_account.is_some() {
        return None;
    }
    let name = naming::collector(&ctx.name);
    Some(ResourceDescriptor::new(
        ResourceKind::ServiceAccount,
        ComponentRole::Collector,
        &ctx.namespace,
        &name,
        ctx.labels(&name, ComponentRole::Collector),
        Labels::new(),
        json!({}),
    ))
}
