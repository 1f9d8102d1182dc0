mod configmap;
mod ingress;
mod service;
mod serviceaccount;
mod workload;

pub use workload::{workload_kind, WorkloadKind};

use crate::builder::RenderContext;
use crate::descriptor::ResourceDescriptor;

/// Every collector object for the context. Sidecars only get their configuration.
pub(crate) fn render(ctx: &RenderContext) -> Vec<ResourceDescriptor> {
    let mut out = vec![configmap::render(ctx)];
    if ctx.workload == WorkloadKind::Sidecar {
        return out;
    }

    out.extend(serviceaccount::render(ctx));
    out.extend(service::render(ctx));
    out.extend(service::render_headless(ctx));
    out.push(service::render_monitoring(ctx));
    out.extend(workload::render(ctx));
    out.extend(ingress::render(ctx));
    out
}
