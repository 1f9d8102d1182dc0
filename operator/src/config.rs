use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context};
use otel_defs::OPERATOR_NAME;
use otel_manifests::ManifestConfig;
use otel_utils::semver_parse_without_build;
use regex::Regex;
use semver::Version;

const DEFAULT_NAMESPACE: &str = "opentelemetry-operator-system";
const DEFAULT_AUTO_DETECT_SECS: u64 = 5;
const NO_POD_NAME: &str = "NO_POD_NAME_FOUND";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Operator,
    Crd,
}

/// Process-wide settings, read once from the environment.
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub mode: RunMode,
    pub manifests: ManifestConfig,
    pub operator_version: Version,
    pub auto_detect_frequency: Duration,
    pub namespace: String,
    pub pod_name: String,
}

impl OperatorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mode = var("MODE").unwrap_or_else(|| "operator".to_string());
        let mode = match mode.to_lowercase().as_str() {
            "operator" => RunMode::Operator,
            "crd" => RunMode::Crd,
            other => return Err(anyhow!("Invalid MODE '{}'. Must be 'operator' or 'crd'", other)),
        };

        let raw_version =
            var("OPERATOR_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let operator_version = semver_parse_without_build(&raw_version).with_context(|| {
            format!("OPERATOR_VERSION '{}' is not a semantic version", raw_version)
        })?;

        let mut manifests = ManifestConfig::for_version(&operator_version.to_string());
        if let Some(image) = var("COLLECTOR_IMAGE") {
            manifests.collector_image = image;
        }
        if let Some(image) = var("TARGET_ALLOCATOR_IMAGE") {
            manifests.target_allocator_image = image;
        }
        manifests.labels_filter =
            parse_labels_filter(var("LABELS_FILTER").as_deref().unwrap_or_default())?;

        let auto_detect_secs = match var("AUTO_DETECT_FREQUENCY_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("AUTO_DETECT_FREQUENCY_SECS '{}' is not a number", raw))?,
            None => DEFAULT_AUTO_DETECT_SECS,
        };

        Ok(Self {
            mode,
            manifests,
            operator_version,
            auto_detect_frequency: Duration::from_secs(auto_detect_secs.max(1)),
            namespace: var("OPERATOR_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            pod_name: var("POD_NAME").unwrap_or_else(|| NO_POD_NAME.to_string()),
        })
    }

    /// Identity used when competing for the leader lease.
    pub fn holder_id(&self) -> String {
        format!("{}-{}", OPERATOR_NAME, self.pod_name)
    }
}

fn parse_labels_filter(raw: &str) -> anyhow::Result<Vec<Regex>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(|pattern| {
            Regex::new(pattern)
                .with_context(|| format!("invalid LABELS_FILTER pattern '{}'", pattern))
        })
        .collect()
}
