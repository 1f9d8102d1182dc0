use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::events::EventType;
use kube::runtime::watcher;
use kube::{Client, Resource, ResourceExt};
use log::{debug, info, warn};
use otel_defs::{OpenTelemetryCollector, LABEL_MANAGED_BY, OPERATOR_NAME};
use otel_manifests::{collector_image, UpgradeChain};
use tokio_util::sync::CancellationToken;

use crate::autodetect::Capabilities;
use crate::config::OperatorConfig;
use crate::errors::ReconcileError;
use crate::events::{actions, reasons, EventPublisher};
use crate::reconcile::{reconcile_instance, KindSummary};
use crate::store::ObjectStore;
use crate::upgrade::{upgrade_instance, InstanceWriter};

const RESYNC_PERIOD: Duration = Duration::from_secs(300);
const CONFLICT_RETRY: Duration = Duration::from_secs(1);
const ERROR_RETRY: Duration = Duration::from_secs(30);

/// Shared state of every reconcile pass during one leadership term.
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub writer: Arc<dyn InstanceWriter>,
    pub events: Arc<dyn EventPublisher>,
    pub capabilities: Arc<Capabilities>,
    pub chain: UpgradeChain,
    pub config: OperatorConfig,
    pub cancel: CancellationToken,
}

/// Upgrades the instance if needed, then converges its child objects.
pub async fn reconcile(
    instance: Arc<OpenTelemetryCollector>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let name = instance.name_any();
    if instance.meta().deletion_timestamp.is_some() {
        debug!("{} is being deleted, children are collected through owner references", name);
        return Ok(Action::await_change());
    }

    let instance = upgrade_instance(
        &ctx.chain,
        &ctx.config.operator_version,
        &instance,
        ctx.writer.as_ref(),
        ctx.events.as_ref(),
    )
    .await?;

    let features = ctx.capabilities.get();
    let result = reconcile_instance(
        ctx.store.as_ref(),
        &instance,
        &ctx.config.manifests,
        features,
        &ctx.cancel,
    )
    .await;
    match result {
        Ok(summary) => {
            let writes: usize = summary.values().map(KindSummary::writes).sum();
            if writes > 0 {
                info!("Reconciled {} with {} write(s)", name, writes);
            } else {
                debug!("{} is converged", name);
            }
            let image = collector_image(&instance, &ctx.config.manifests);
            if instance.status_image() != Some(image.as_str()) {
                ctx.writer.record_image(&instance, &image).await?;
            }
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(error) => {
            if let ReconcileError::Build(e) = &error {
                ctx.events
                    .publish(
                        &instance.object_ref(&()),
                        EventType::Warning,
                        reasons::FAILED_BUILD,
                        actions::RECONCILE,
                        Some(e.to_string()),
                    )
                    .await;
            }
            Err(error)
        }
    }
}

pub fn requeue_after(error: &ReconcileError) -> Duration {
    if error.is_conflict() {
        CONFLICT_RETRY
    } else {
        ERROR_RETRY
    }
}

pub fn error_policy(
    instance: Arc<OpenTelemetryCollector>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    if error.is_cancelled() {
        debug!("Reconcile of {} was cancelled", instance.name_any());
    } else {
        warn!("Reconcile of {} failed: {}", instance.name_any(), error);
    }
    Action::requeue(requeue_after(error))
}

/// Watches collectors and the objects they own until the future is dropped.
/// A capability change re-triggers every collector.
pub async fn run(client: Client, ctx: Arc<Context>) {
    let collectors: Api<OpenTelemetryCollector> = Api::all(client.clone());
    let owned =
        watcher::Config::default().labels(&format!("{}={}", LABEL_MANAGED_BY, OPERATOR_NAME));

    let (trigger, reconcile_all) = mpsc::unbounded::<()>();
    ctx.capabilities.on_change(move |_| {
        let _ = trigger.unbounded_send(());
    });

    info!("Starting collector controller");
    Controller::new(collectors, watcher::Config::default())
        .owns(Api::<ConfigMap>::all(client.clone()), owned.clone())
        .owns(Api::<ServiceAccount>::all(client.clone()), owned.clone())
        .owns(Api::<Service>::all(client.clone()), owned.clone())
        .owns(Api::<Deployment>::all(client.clone()), owned.clone())
        .owns(Api::<StatefulSet>::all(client.clone()), owned.clone())
        .owns(Api::<DaemonSet>::all(client.clone()), owned.clone())
        .owns(Api::<Ingress>::all(client), owned)
        .reconcile_all_on(reconcile_all)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!("Reconciled {}", object.name),
                Err(e) => debug!("Controller error: {:?}", e),
            }
        })
        .await;
}
