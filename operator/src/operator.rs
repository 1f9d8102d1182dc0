use std::sync::Arc;
use std::time::Duration;

use kube::Client as KubeClient;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use log::{error, info, warn};
use otel_defs::OPERATOR_NAME;
use otel_manifests::UpgradeChain;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::autodetect::{self, Capabilities, Detector, KubeDetector};
use crate::config::OperatorConfig;
use crate::controller::{self, Context};
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::store::KubeStore;
use crate::upgrade::{upgrade_managed_instances, InstanceWriter, KubeInstanceWriter};

const LEASE_TTL: Duration = Duration::from_secs(25);
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const FOLLOWER_WAIT: Duration = Duration::from_secs(15);

pub async fn start_operator(config: OperatorConfig) -> anyhow::Result<()> {
    let client = KubeClient::try_default().await?;
    let leadership = create_lease_lock(client.clone(), &config);

    loop {
        match leadership.try_acquire_or_renew().await {
            Ok(lease) if lease.acquired_lease => {
                info!("Leadership acquired!");
                lead(client.clone(), &config, &leadership).await;
            }
            Ok(_) => {
                info!("There is already a leader, waiting for it to release leadership");
                time::sleep(FOLLOWER_WAIT).await;
            }
            Err(e) => {
                warn!("Failed to acquire leadership: {:?}", e);
                time::sleep(FOLLOWER_WAIT).await;
            }
        }
    }
}

fn create_lease_lock(client: KubeClient, config: &OperatorConfig) -> LeaseLock {
    LeaseLock::new(
        client,
        &config.namespace,
        LeaseLockParams {
            holder_id: config.holder_id(),
            lease_name: format!("{}-lock", OPERATOR_NAME),
            lease_ttl: LEASE_TTL,
        },
    )
}

/// Runs the controller and capability detection until the lease is lost.
async fn lead(client: KubeClient, config: &OperatorConfig, leadership: &LeaseLock) {
    let cancel = CancellationToken::new();
    let capabilities = Arc::new(Capabilities::default());
    let detector: Arc<dyn Detector> = Arc::new(KubeDetector::new(client.clone()));
    autodetect::refresh(detector.as_ref(), &capabilities).await;

    let writer: Arc<dyn InstanceWriter> = Arc::new(KubeInstanceWriter::new(client.clone()));
    let events: Arc<dyn EventPublisher> = Arc::new(KubeEventPublisher::new(
        client.clone(),
        OPERATOR_NAME,
        Some(config.pod_name.clone()),
    ));
    let chain = UpgradeChain::builtin();

    if let Err(e) = upgrade_managed_instances(
        client.clone(),
        &chain,
        &config.operator_version,
        writer.as_ref(),
        events.as_ref(),
    )
    .await
    {
        error!("Startup upgrade sweep failed: {:?}", e);
    }

    let ctx = Arc::new(Context {
        store: Arc::new(KubeStore::new(client.clone())),
        writer,
        events,
        capabilities: capabilities.clone(),
        chain,
        config: config.clone(),
        cancel: cancel.clone(),
    });

    let detection = tokio::spawn(autodetect::run(
        detector,
        capabilities,
        config.auto_detect_frequency,
        cancel.clone(),
    ));
    let controller = tokio::spawn(controller::run(client, ctx));

    renew_leadership(leadership).await;

    cancel.cancel();
    controller.abort();
    if let Err(e) = detection.await {
        warn!("Capability detection task ended abnormally: {:?}", e);
    }
}

async fn renew_leadership(leadership: &LeaseLock) {
    let mut renew_interval = time::interval(RENEW_INTERVAL);

    loop {
        renew_interval.tick().await;
        match leadership.try_acquire_or_renew().await {
            Ok(lease) if lease.acquired_lease => {
                info!("Leadership renewed for {}", OPERATOR_NAME);
            }
            Ok(_) => {
                warn!("Lost leadership to another replica");
                break;
            }
            Err(e) => {
                error!("Lost leadership due to error: {:?}", e);
                break;
            }
        }
    }
}
