mod v0_2_10;
mod v0_31_0;
mod v0_36_0;
mod v0_39_0;
mod v0_41_0;

use std::collections::BTreeMap;
use std::ops::Bound;

use log::{debug, info, warn};
use otel_defs::{
    OpenTelemetryCollector, OpenTelemetryCollectorSpec, OpenTelemetryCollectorStatus,
    UpgradeStrategy,
};
use otel_utils::semver_parse_without_build;
use semver::Version;

use crate::config_doc::{ConfigDocument, NodeMap};
use crate::errors::{UpgradeError, UpgradeStepError};

/// A migration to the version it is registered under.
pub type UpgradeFn = fn(&mut UpgradeContext) -> Result<(), UpgradeStepError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeWarning {
    pub version: Version,
    pub message: String,
}

/// State threaded through the steps of one chain run.
pub struct UpgradeContext {
    version: Version,
    spec: OpenTelemetryCollectorSpec,
    doc: Option<ConfigDocument>,
    // Document as of the last successful step, to detect edits.
    baseline: Option<ConfigDocument>,
    warnings: Vec<UpgradeWarning>,
}

impl UpgradeContext {
    fn new(spec: OpenTelemetryCollectorSpec) -> Self {
        Self {
            version: Version::new(0, 0, 0),
            spec,
            doc: None,
            baseline: None,
            warnings: Vec::new(),
        }
    }

    /// Version of the step currently running.
    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn spec(&self) -> &OpenTelemetryCollectorSpec {
        &self.spec
    }

    pub fn spec_mut(&mut self) -> &mut OpenTelemetryCollectorSpec {
        &mut self.spec
    }

    /// The parsed configuration. Parsed on first use, edits are written back
    /// into the spec once the step succeeds.
    pub fn config(&mut self) -> Result<&mut ConfigDocument, UpgradeStepError> {
        let doc = match self.doc.take() {
            Some(doc) => doc,
            None => {
                let parsed = ConfigDocument::parse(&self.spec.config).map_err(|e| {
                    self.fail(format!("couldn't parse the collector configuration: {}", e))
                })?;
                self.baseline = Some(parsed.clone());
                parsed
            }
        };
        Ok(self.doc.insert(doc))
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("upgrade to v{}: {}", self.version, message);
        self.warnings.push(UpgradeWarning {
            version: self.version.clone(),
            message,
        });
    }

    pub fn fail(&self, reason: impl Into<String>) -> UpgradeStepError {
        UpgradeStepError {
            version: self.version.clone(),
            reason: reason.into(),
        }
    }

    // Writes an edited document back into the spec.
    fn commit(&mut self) -> Result<(), UpgradeStepError> {
        let Some(doc) = &self.doc else {
            return Ok(());
        };
        if self.baseline.as_ref() == Some(doc) {
            return Ok(());
        }
        let text = doc.serialize().map_err(|e| {
            self.fail(format!("couldn't serialize the upgraded configuration: {}", e))
        })?;
        self.spec.config = text;
        self.baseline = self.doc.clone();
        Ok(())
    }

    fn rollback(&mut self, spec: OpenTelemetryCollectorSpec) {
        self.spec = spec;
        self.doc = self.baseline.clone();
    }
}

/// Named components of one configuration section (`receivers`, `processors`, ...)
/// whose name starts with `prefix` and whose settings are a map.
pub(crate) fn components_mut<'a>(
    doc: &'a mut ConfigDocument,
    section: &str,
    prefix: &str,
) -> Vec<(&'a str, &'a mut NodeMap)> {
    let Ok(components) = doc.map_at_mut(&[section]) else {
        return Vec::new();
    };
    components
        .iter_mut()
        .filter(|(name, _)| name.starts_with(prefix))
        .filter_map(|(name, node)| match node.as_map_mut() {
            Some(settings) => Some((name.as_str(), settings)),
            None => {
                debug!("{} '{}' has no settings to upgrade", section, name);
                None
            }
        })
        .collect()
}

/// Result of running the chain against one instance.
#[derive(Debug)]
pub struct UpgradeOutcome {
    /// Upgraded copy of the input. Equal to the input when nothing was applied.
    pub instance: OpenTelemetryCollector,
    pub applied: Vec<Version>,
    pub warnings: Vec<UpgradeWarning>,
    pub error: Option<UpgradeError>,
}

impl UpgradeOutcome {
    fn unchanged(instance: &OpenTelemetryCollector) -> Self {
        Self {
            instance: instance.clone(),
            applied: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Whether the stored version advanced and the instance should be persisted.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Ordered registry of configuration migrations.
#[derive(Clone)]
pub struct UpgradeChain {
    steps: BTreeMap<Version, UpgradeFn>,
}

impl UpgradeChain {
    pub fn new(steps: impl IntoIterator<Item = (Version, UpgradeFn)>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Every migration shipped with the operator.
    pub fn builtin() -> Self {
        Self::new([
            (Version::new(0, 2, 10), v0_2_10::upgrade as UpgradeFn),
            (Version::new(0, 31, 0), v0_31_0::upgrade as UpgradeFn),
            (Version::new(0, 36, 0), v0_36_0::upgrade as UpgradeFn),
            (Version::new(0, 39, 0), v0_39_0::upgrade as UpgradeFn),
            (Version::new(0, 41, 0), v0_41_0::upgrade as UpgradeFn),
        ])
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.steps.keys()
    }

    /// Applies, in ascending order, every step newer than the instance's stored
    /// version and not newer than `operator_version`. Stops at the first failing
    /// step and keeps what the earlier steps did.
    pub fn apply(
        &self,
        instance: &OpenTelemetryCollector,
        operator_version: &Version,
    ) -> UpgradeOutcome {
        if instance.spec.upgrade_strategy == UpgradeStrategy::None {
            debug!("upgrades disabled for {:?}", instance.metadata.name);
            return UpgradeOutcome::unchanged(instance);
        }

        let stored = match instance.stored_version() {
            None => None,
            Some(raw) => match semver_parse_without_build(raw) {
                Ok(version) => Some(version),
                Err(source) => {
                    let mut outcome = UpgradeOutcome::unchanged(instance);
                    outcome.error = Some(UpgradeError::InvalidStoredVersion {
                        version: raw.to_string(),
                        source,
                    });
                    return outcome;
                }
            },
        };

        if stored.as_ref().is_some_and(|version| version >= operator_version) {
            debug!("{:?} is already at v{}", instance.metadata.name, operator_version);
            return UpgradeOutcome::unchanged(instance);
        }

        let lower = match &stored {
            Some(version) => Bound::Excluded(version),
            None => Bound::Unbounded,
        };
        let pending = self
            .steps
            .range::<Version, _>((lower, Bound::Included(operator_version)));

        let mut ctx = UpgradeContext::new(instance.spec.clone());
        let mut applied = Vec::new();
        let mut error = None;

        for (version, step) in pending {
            ctx.version = version.clone();
            let before = ctx.spec.clone();
            match step(&mut ctx).and_then(|_| ctx.commit()) {
                Ok(()) => {
                    info!("upgraded {:?} to v{}", instance.metadata.name, version);
                    applied.push(version.clone());
                }
                Err(e) => {
                    warn!("{}", e);
                    ctx.rollback(before);
                    error = Some(UpgradeError::Step(e));
                    break;
                }
            }
        }

        let mut upgraded = instance.clone();
        if let Some(last) = applied.last() {
            upgraded.spec = ctx.spec;
            upgraded
                .status
                .get_or_insert_with(OpenTelemetryCollectorStatus::default)
                .version = Some(last.to_string());
        }

        UpgradeOutcome {
            instance: upgraded,
            applied,
            warnings: ctx.warnings,
            error,
        }
    }
}

/// Runs a single step as if it were the whole chain.
#[cfg(test)]
pub(crate) fn run_step(step: UpgradeFn, version: Version, config: &str) -> UpgradeOutcome {
    let instance = OpenTelemetryCollector::new(
        "test",
        OpenTelemetryCollectorSpec {
            config: config.to_string(),
            ..Default::default()
        },
    );
    UpgradeChain::new([(version.clone(), step)]).apply(&instance, &version)
}
