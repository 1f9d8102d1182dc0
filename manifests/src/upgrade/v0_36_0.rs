use super::{components_mut, UpgradeContext};
use crate::config_doc::MapExt;
use crate::errors::UpgradeStepError;

/// `tls_settings` of otlp receiver protocols became `tls`.
pub(super) fn upgrade(ctx: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
    let mut warnings = Vec::new();
    for (name, settings) in components_mut(ctx.config()?, "receivers", "otlp") {
        let Ok(protocols) = settings.map_at_mut(&["protocols"]) else {
            continue;
        };
        for (protocol, node) in protocols.iter_mut() {
            let Some(protocol_settings) = node.as_map_mut() else {
                continue;
            };
            if !protocol_settings.contains_key("tls_settings") {
                continue;
            }
            if protocol_settings.rename_key("tls_settings", "tls").is_err() {
                protocol_settings.shift_remove("tls_settings");
                warnings.push(format!(
                    "dropped 'tls_settings' of the '{}' protocol of the '{}' receiver, {}",
                    protocol, name, "'tls' is already set"
                ));
            }
        }
    }
    for message in warnings {
        ctx.warn(message);
    }
    Ok(())
}
