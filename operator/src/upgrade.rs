use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use log::{info, warn};
use otel_defs::OpenTelemetryCollector;
use otel_manifests::UpgradeChain;
use semver::Version;
use serde_json::json;

use crate::errors::ReconcileError;
use crate::events::{actions, reasons, EventPublisher};

/// Writes upgraded instances back to the cluster.
#[async_trait]
pub trait InstanceWriter: Send + Sync {
    /// Persists the spec and the recorded version of `instance`.
    async fn persist(
        &self,
        instance: &OpenTelemetryCollector,
    ) -> Result<OpenTelemetryCollector, ReconcileError>;

    /// Records the collector image the instance's workload now runs.
    async fn record_image(
        &self,
        instance: &OpenTelemetryCollector,
        image: &str,
    ) -> Result<(), ReconcileError>;
}

pub struct KubeInstanceWriter {
    client: Client,
}

impl KubeInstanceWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, instance: &OpenTelemetryCollector) -> Api<OpenTelemetryCollector> {
        let namespace = instance.namespace().unwrap_or_default();
        Api::namespaced(self.client.clone(), &namespace)
    }
}

#[async_trait]
impl InstanceWriter for KubeInstanceWriter {
    async fn persist(
        &self,
        instance: &OpenTelemetryCollector,
    ) -> Result<OpenTelemetryCollector, ReconcileError> {
        let name = instance.name_any();
        let api = self.api(instance);

        // The main resource ignores status, so the version is written separately.
        api.replace(&name, &PostParams::default(), instance).await?;
        let status_patch = json!({
            "status": { "version": instance.stored_version() }
        });
        let updated = api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?;
        Ok(updated)
    }

    async fn record_image(
        &self,
        instance: &OpenTelemetryCollector,
        image: &str,
    ) -> Result<(), ReconcileError> {
        let status_patch = json!({ "status": { "image": image } });
        self.api(instance)
            .patch_status(
                &instance.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&status_patch),
            )
            .await?;
        Ok(())
    }
}

/// Runs the chain against `instance`, records warnings and failures as events,
/// and persists the result when any step was applied. Returns the instance the
/// rest of the pass should render from.
pub async fn upgrade_instance(
    chain: &UpgradeChain,
    operator_version: &Version,
    instance: &OpenTelemetryCollector,
    writer: &dyn InstanceWriter,
    events: &dyn EventPublisher,
) -> Result<OpenTelemetryCollector, ReconcileError> {
    let outcome = chain.apply(instance, operator_version);
    let reference = instance.object_ref(&());

    for warning in &outcome.warnings {
        events
            .publish(
                &reference,
                EventType::Normal,
                reasons::UPGRADE,
                actions::UPGRADE,
                Some(format!("v{}: {}", warning.version, warning.message)),
            )
            .await;
    }
    if let Some(error) = &outcome.error {
        warn!("Upgrade of {} stopped: {}", instance.name_any(), error);
        events
            .publish(
                &reference,
                EventType::Warning,
                reasons::FAILED_UPGRADE,
                actions::UPGRADE,
                Some(error.to_string()),
            )
            .await;
    }

    if !outcome.changed() {
        return Ok(outcome.instance);
    }
    info!(
        "Persisting {} after upgrade steps {:?}",
        instance.name_any(),
        outcome.applied.iter().map(Version::to_string).collect::<Vec<_>>()
    );
    writer.persist(&outcome.instance).await
}

/// Upgrades every collector in the cluster once. Failures are logged per instance.
pub async fn upgrade_managed_instances(
    client: Client,
    chain: &UpgradeChain,
    operator_version: &Version,
    writer: &dyn InstanceWriter,
    events: &dyn EventPublisher,
) -> anyhow::Result<usize> {
    let api: Api<OpenTelemetryCollector> = Api::all(client);
    let instances = api.list(&ListParams::default()).await?;

    let mut upgraded = 0;
    for instance in instances {
        let before = instance.stored_version().map(str::to_string);
        match upgrade_instance(chain, operator_version, &instance, writer, events).await {
            Ok(result) if result.stored_version().map(str::to_string) != before => upgraded += 1,
            Ok(_) => {}
            Err(e) => warn!("Failed to upgrade {}: {}", instance.name_any(), e),
        }
    }
    info!("Startup upgrade sweep finished, {} instance(s) upgraded", upgraded);
    Ok(upgraded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingPublisher;
    use otel_defs::{OpenTelemetryCollectorSpec, OpenTelemetryCollectorStatus};
    use otel_manifests::{UpgradeContext, UpgradeFn, UpgradeStepError};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        persisted: Mutex<Vec<OpenTelemetryCollector>>,
    }

    #[async_trait]
    impl InstanceWriter for RecordingWriter {
        async fn persist(
            &self,
            instance: &OpenTelemetryCollector,
        ) -> Result<OpenTelemetryCollector, ReconcileError> {
            self.persisted.lock().unwrap().push(instance.clone());
            Ok(instance.clone())
        }

        async fn record_image(
            &self,
            _instance: &OpenTelemetryCollector,
            _image: &str,
        ) -> Result<(), ReconcileError> {
            Ok(())
        }
    }

    fn instance(config: &str, stored: Option<&str>) -> OpenTelemetryCollector {
        let mut instance = OpenTelemetryCollector::new(
            "legacy",
            OpenTelemetryCollectorSpec {
                config: config.to_string(),
                ..Default::default()
            },
        );
        instance.metadata.namespace = Some("observability".to_string());
        instance.status = Some(OpenTelemetryCollectorStatus {
            version: stored.map(str::to_string),
            image: None,
        });
        instance
    }

    const LEGACY: &str = "receivers:\n  influxdb:\n    metrics_schema: telegraf-prometheus-v1\n";

    #[tokio::test]
    async fn test_upgraded_instance_is_persisted_with_events() {
        let writer = RecordingWriter::default();
        let events = RecordingPublisher::default();
        let result = upgrade_instance(
            &UpgradeChain::builtin(),
            &Version::new(0, 41, 0),
            &instance(LEGACY, Some("0.30.0")),
            &writer,
            &events,
        )
        .await
        .unwrap();

        assert_eq!(result.stored_version(), Some("0.41.0"));
        assert_eq!(result.spec.config, "receivers:\n  influxdb: {}\n");
        assert_eq!(writer.persisted.lock().unwrap().len(), 1);
        assert_eq!(events.reasons(), vec!["Upgrade"]);
    }

    #[tokio::test]
    async fn test_current_instance_is_left_alone() {
        let writer = RecordingWriter::default();
        let events = RecordingPublisher::default();
        let input = instance(LEGACY, Some("0.41.0"));
        let result = upgrade_instance(
            &UpgradeChain::builtin(),
            &Version::new(0, 41, 0),
            &input,
            &writer,
            &events,
        )
        .await
        .unwrap();

        assert_eq!(result, input);
        assert!(writer.persisted.lock().unwrap().is_empty());
        assert!(events.reasons().is_empty());
    }

    fn broken(ctx: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
        Err(ctx.fail("cannot migrate"))
    }

    fn noop(_: &mut UpgradeContext) -> Result<(), UpgradeStepError> {
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_step_is_reported_and_progress_kept() {
        let chain = UpgradeChain::new([
            (Version::new(0, 1, 0), noop as UpgradeFn),
            (Version::new(0, 2, 0), broken as UpgradeFn),
        ]);
        let writer = RecordingWriter::default();
        let events = RecordingPublisher::default();
        let result = upgrade_instance(
            &chain,
            &Version::new(0, 2, 0),
            &instance("", None),
            &writer,
            &events,
        )
        .await
        .unwrap();

        assert_eq!(result.stored_version(), Some("0.1.0"));
        assert_eq!(writer.persisted.lock().unwrap().len(), 1);
        assert_eq!(events.reasons(), vec!["FailedUpgrade"]);
        let events = events.events.lock().unwrap();
        assert_eq!(events[0].0, EventType::Warning);
    }
}
