use log::debug;

use crate::config_doc::{ConfigDocument, ConfigNode, MapExt, NodeMap};

const SCRAPE_INTERVAL: &str = "30s";
const COLLECTOR_ID: &str = "${POD_NAME}";

/// Receivers whose discovery can be delegated to the target allocator.
fn is_prometheus(name: &str) -> bool {
    name == "prometheus" || name.starts_with("prometheus/")
}

/// All `config.scrape_configs` entries of prometheus receivers, in order.
pub fn scrape_configs(doc: &ConfigDocument) -> Vec<ConfigNode> {
    let Ok(receivers) = doc.map_at(&["receivers"]) else {
        return Vec::new();
    };
    receivers
        .iter()
        .filter(|(name, _)| is_prometheus(name))
        .filter_map(|(name, node)| {
            let configs = node.as_map()?.node_at(&["config", "scrape_configs"]);
            match configs {
                Ok(ConfigNode::Seq(items)) => Some(items.clone()),
                Ok(other) => {
                    debug!("scrape_configs of '{}' is a {}, ignoring", name, other.kind());
                    None
                }
                Err(_) => None,
            }
        })
        .flatten()
        .collect()
}

/// Points every prometheus receiver at the allocator instead of its own scrape
/// configuration. Returns the number of receivers rewritten.
pub fn delegate_to_target_allocator(doc: &mut ConfigDocument, endpoint: &str) -> usize {
    let Ok(receivers) = doc.map_at_mut(&["receivers"]) else {
        return 0;
    };

    let mut rewritten = 0;
    for (name, node) in receivers.iter_mut() {
        if !is_prometheus(name) {
            continue;
        }
        if matches!(node, ConfigNode::Null) {
            *node = ConfigNode::Map(NodeMap::new());
        }
        let Some(receiver) = node.as_map_mut() else {
            debug!("prometheus receiver '{}' is not a map, leaving it alone", name);
            continue;
        };

        if let Err(reason) = receiver.remove_at(&["config", "scrape_configs"]) {
            debug!("receiver '{}': {}", name, reason);
        }
        receiver.insert(
            "target_allocator".to_string(),
            ConfigNode::map([
                ("endpoint", ConfigNode::from(endpoint)),
                ("interval", ConfigNode::from(SCRAPE_INTERVAL)),
                ("collector_id", ConfigNode::from(COLLECTOR_ID)),
            ]),
        );
        rewritten += 1;
    }
    rewritten
}
