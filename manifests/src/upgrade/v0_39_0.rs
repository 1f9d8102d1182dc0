use super::{components_mut, UpgradeContext};
use crate::errors::UpgradeStepError;

const BALLAST_FIELD: &str = "ballast_size_mib";

/// The memory limiter stopped managing the ballast; the setting is dropped.
pub(super) fn upgrade(ctx: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
    let mut dropped = Vec::new();
    for (name, settings) in components_mut(ctx.config()?, "processors", "memory_limiter") {
        if settings.shift_remove(BALLAST_FIELD).is_some() {
            dropped.push(format!(
                "dropped the '{}' field from the '{}' processor, {}",
                BALLAST_FIELD, name, "configure the memory_ballast extension instead"
            ));
        }
    }
    for message in dropped {
        ctx.warn(message);
    }
    Ok(())
}
