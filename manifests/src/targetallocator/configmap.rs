use serde_json::json;

use crate::builder::RenderContext;
use crate::config_doc::{ConfigDocument, ConfigNode, NodeMap};
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::labels::{self, Labels};

/// The allocator's own configuration: strategy, collected scrape jobs and the
/// selector of the collector pods it hands targets to.
pub(crate) fn config_text(ctx: &RenderContext) -> Result<String, serde_yaml::Error> {
    let spec = &ctx.instance.spec.target_allocator;

    let label_selector = labels::selector(ctx.instance, ComponentRole::Collector)
        .into_iter()
        .map(|(k, v)| (k, ConfigNode::from(v)));

    let mut root = NodeMap::new();
    root.insert(
        "allocation_strategy".to_string(),
        spec.allocation_strategy.as_str().into(),
    );
    root.insert(
        "config".to_string(),
        ConfigNode::map([("scrape_configs", ConfigNode::Seq(ctx.scrape_configs.clone()))]),
    );
    root.insert("label_selector".to_string(), ConfigNode::map(label_selector));
    if spec.prometheus_cr.enabled {
        root.insert(
            "prometheus_cr".to_string(),
            ConfigNode::map([("enabled", ConfigNode::Bool(true))]),
        );
    }
    ConfigDocument::from_map(root).serialize()
}

pub(crate) fn render(ctx: &RenderContext, name: &str, text: &str) -> ResourceDescriptor {
    let mut data = serde_json::Map::new();
    data.insert(
        ctx.config.target_allocator_config_map_entry.clone(),
        json!(text),
    );
    ResourceDescriptor::new(
        ResourceKind::ConfigMap,
        ComponentRole::TargetAllocator,
        &ctx.namespace,
        name,
        ctx.target_allocator_labels(name),
        Labels::new(),
        json!({ "data": data }),
    )
}
