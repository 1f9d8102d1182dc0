use super::UpgradeContext;
use crate::errors::UpgradeStepError;

// First version that records upgrades. Marks the starting point only.
pub(super) fn upgrade(_ctx: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
    Ok(())
}
