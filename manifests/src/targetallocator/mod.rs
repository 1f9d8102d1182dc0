mod configmap;
mod service;
mod servicemonitor;
mod workload;

use otel_defs::{LABEL_NAME, TARGET_ALLOCATOR_SERVICE_PORT};
use otel_utils::sha256_hex;

use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor};
use crate::errors::BuildError;
use crate::labels::{self, Labels};
use crate::naming;

/// Address collector receivers use to reach the allocator.
pub fn endpoint(instance_name: &str) -> String {
    format!(
        "http://{}:{}",
        naming::target_allocator(instance_name),
        TARGET_ALLOCATOR_SERVICE_PORT
    )
}

fn selector(ctx: &RenderContext, name: &str) -> Labels {
    let mut labels = labels::selector(ctx.instance, ComponentRole::TargetAllocator);
    labels.insert(LABEL_NAME.to_string(), name.to_string());
    labels
}

pub(crate) fn render(ctx: &RenderContext) -> Result<Vec<ResourceDescriptor>, BuildError> {
    let name = naming::target_allocator(&ctx.name);
    let text = configmap::config_text(ctx)?;
    let hash = sha256_hex(&text);

    let mut out = vec![configmap::render(ctx, &name, &text)];
    out.extend(service::render_service_account(ctx, &name));
    out.push(service::render(ctx, &name));
    out.push(workload::render(ctx, &name, &hash));
    out.extend(servicemonitor::render(ctx, &name));
    Ok(out)
}
