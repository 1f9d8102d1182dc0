use serde_json::json;

use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::Labels;
use crate::naming;

/// Config map carrying the rendered collector configuration under the configured entry.
pub(crate) fn render(ctx: &RenderContext) -> ResourceDescriptor {
    let name = naming::collector(&ctx.name);
    let mut data = serde_json::Map::new();
    data.insert(
        ctx.config.collector_config_map_entry.clone(),
        json!(ctx.collector_config),
    );
    ResourceDescriptor::new(
        ResourceKind::ConfigMap,
        ComponentRole::Collector,
        &ctx.namespace,
        &name,
        ctx.labels(&name, ComponentRole::Collector),
        Labels::new(),
        json!({ "data": data }),
    )
}
