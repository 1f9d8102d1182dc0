use kube::ResourceExt;
use log::debug;
use otel_defs::OpenTelemetryCollector;
use otel_utils::sha256_hex;

use crate::adapters::{collector_ports, delegate_to_target_allocator, scrape_configs, ContainerPort};
use crate::collector::{self, workload_kind, WorkloadKind};
use crate::config_doc::{ConfigDocument, ConfigNode};
use crate::descriptor::{ComponentRole, ResourceDescriptor};
use crate::errors::BuildError;
use crate::labels::{self, Labels};
use crate::params::{ClusterFeatures, ManifestConfig};
use crate::targetallocator;

/// Everything derived once per pass and shared by the individual renderers.
pub(crate) struct RenderContext<'a> {
    pub instance: &'a OpenTelemetryCollector,
    pub config: &'a ManifestConfig,
    pub features: ClusterFeatures,
    pub name: String,
    pub namespace: String,
    pub workload: WorkloadKind,
    pub collector_image: String,
    /// Configuration text as stored in the collector config map.
    pub collector_config: String,
    pub config_hash: String,
    pub ports: Vec<ContainerPort>,
    pub scrape_configs: Vec<ConfigNode>,
}

impl RenderContext<'_> {
    pub fn target_allocator_enabled(&self) -> bool {
        self.instance.spec.target_allocator.enabled && self.workload != WorkloadKind::Sidecar
    }

    pub fn target_allocator_image(&self) -> String {
        self.instance
            .spec
            .target_allocator
            .image
            .clone()
            .unwrap_or_else(|| self.config.target_allocator_image.clone())
    }

    pub fn labels(&self, name: &str, role: ComponentRole) -> Labels {
        labels::common(
            self.instance,
            name,
            role,
            &self.collector_image,
            &self.config.labels_filter,
        )
    }

    pub fn target_allocator_labels(&self, name: &str) -> Labels {
        labels::common(
            self.instance,
            name,
            ComponentRole::TargetAllocator,
            &self.target_allocator_image(),
            &self.config.labels_filter,
        )
    }
}

/// Image the collector workload of `instance` runs.
pub fn collector_image(instance: &OpenTelemetryCollector, config: &ManifestConfig) -> String {
    instance
        .spec
        .image
        .clone()
        .unwrap_or_else(|| config.collector_image.clone())
}

/// Renders the complete desired object set of `instance`, ordered by
/// reconciliation order of the kinds. Pure: identical input gives identical output.
pub fn build_all(
    instance: &OpenTelemetryCollector,
    config: &ManifestConfig,
    features: ClusterFeatures,
) -> Result<Vec<ResourceDescriptor>, BuildError> {
    let spec = &instance.spec;
    let name = instance.name_any();
    let workload = workload_kind(spec);
    let target_allocation = spec.target_allocator.enabled && workload != WorkloadKind::Sidecar;

    let mut doc = ConfigDocument::parse(&spec.config)?;
    let ports = collector_ports(&doc, &spec.ports);

    let (collector_config, scrapes) = if target_allocation {
        let scrapes = scrape_configs(&doc);
        let rewritten = delegate_to_target_allocator(&mut doc, &targetallocator::endpoint(&name));
        debug!(
            "delegated {} prometheus receiver(s) of {} to the target allocator",
            rewritten, name
        );
        if rewritten > 0 {
            (doc.serialize()?, scrapes)
        } else {
            (spec.config.clone(), scrapes)
        }
    } else {
        (spec.config.clone(), Vec::new())
    };

    let ctx = RenderContext {
        instance,
        config,
        features,
        namespace: instance.namespace().unwrap_or_default(),
        workload,
        collector_image: collector_image(instance, config),
        config_hash: sha256_hex(&collector_config),
        collector_config,
        ports,
        scrape_configs: scrapes,
        name,
    };

    let mut out = collector::render(&ctx);
    if ctx.target_allocator_enabled() {
        out.extend(targetallocator::render(&ctx)?);
    }
    out.sort_by_key(|descriptor| descriptor.kind);
    Ok(out)
}
