use serde_json::{json, Value};

use crate::builder::RenderContext;
use crate::descriptor::{ComponentRole, ResourceDescriptor, ResourceKind};
use crate::naming;

/// Ingress routing `/<port>` to the collector service, one path per derived port.
pub(crate) fn render(ctx: &RenderContext) -> Option<ResourceDescriptor> {
    let spec = &ctx.instance.spec.ingress;
    if spec.type_.is_none() || ctx.ports.is_empty() {
        return None;
    }

    let service = naming::collector(&ctx.name);
    let paths: Vec<Value> = ctx
        .ports
        .iter()
        .map(|p| {
            json!({
                "path": format!("/{}", p.name),
                "pathType": "Prefix",
                "backend": {
                    "service": { "name": service, "port": { "name": p.name } },
                },
            })
        })
        .collect();

    let mut rule = json!({ "http": { "paths": paths } });
    if let Some(host) = &spec.hostname {
        rule["host"] = json!(host);
    }
    let mut body = json!({ "spec": { "rules": [rule] } });
    if let Some(class) = &spec.ingress_class_name {
        body["spec"]["ingressClassName"] = json!(class);
    }

    let name = naming::ingress(&ctx.name);
    Some(ResourceDescriptor::new(
        ResourceKind::Ingress,
        ComponentRole::Collector,
        &ctx.namespace,
        &name,
        ctx.labels(&name, ComponentRole::Collector),
        spec.annotations.clone(),
        body,
    ))
}
