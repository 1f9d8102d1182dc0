use super::{components_mut, UpgradeContext};
use crate::errors::UpgradeStepError;

const FIELD_PREFIX: &str = "metrics_schema";

/// The influxdb receiver lost its `metrics_schema` settings; they are dropped.
pub(super) fn upgrade(ctx: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
    let mut dropped = Vec::new();
    for (name, settings) in components_mut(ctx.config()?, "receivers", "influxdb") {
        let fields: Vec<String> = settings
            .keys()
            .filter(|key| key.starts_with(FIELD_PREFIX))
            .cloned()
            .collect();
        for field in fields {
            settings.shift_remove(&field);
            dropped.push(format!(
                "dropped the '{}' field from the '{}' receiver",
                field, name
            ));
        }
    }
    for message in dropped {
        ctx.warn(message);
    }
    Ok(())
}
