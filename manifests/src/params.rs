use otel_defs::{DEFAULT_COLLECTOR_CONFIG_MAP_ENTRY, DEFAULT_TARGET_ALLOCATOR_CONFIG_MAP_ENTRY};
use regex::Regex;

/// Static defaults the builder renders with.
#[derive(Clone, Debug)]
pub struct ManifestConfig {
    pub collector_image: String,
    pub target_allocator_image: String,
    pub collector_config_map_entry: String,
    pub target_allocator_config_map_entry: String,
    /// Instance labels matching any of these are not copied onto children.
    pub labels_filter: Vec<Regex>,
}

impl ManifestConfig {
    pub fn for_version(version: &str) -> Self {
        Self {
            collector_image: format!("otel/opentelemetry-collector-contrib:{}", version),
            target_allocator_image: format!(
                "ghcr.io/open-telemetry/opentelemetry-operator/target-allocator:{}",
                version
            ),
            collector_config_map_entry: DEFAULT_COLLECTOR_CONFIG_MAP_ENTRY.to_string(),
            target_allocator_config_map_entry: DEFAULT_TARGET_ALLOCATOR_CONFIG_MAP_ENTRY
                .to_string(),
            labels_filter: Vec::new(),
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self::for_version(env!("CARGO_PKG_VERSION"))
    }
}

/// Cluster APIs detected at runtime that change what gets rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClusterFeatures {
    /// `monitoring.coreos.com/v1` ServiceMonitor is served.
    pub prometheus_operator: bool,
}
