use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use log::{info, warn};
use otel_manifests::ClusterFeatures;
use tokio::time;
use tokio_util::sync::CancellationToken;

const MONITORING_API: &str = "monitoring.coreos.com/v1";
const SERVICE_MONITOR_KIND: &str = "ServiceMonitor";

type Callback = Box<dyn Fn(ClusterFeatures) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest detected cluster features, with listeners notified on every change.
#[derive(Default)]
pub struct Capabilities {
    features: Mutex<ClusterFeatures>,
    callbacks: Mutex<Vec<Callback>>,
}

impl Capabilities {
    pub fn get(&self) -> ClusterFeatures {
        *lock(&self.features)
    }

    /// Stores `features`. Returns whether they differ from the previous value, in
    /// which case every registered callback has been invoked.
    pub fn set(&self, features: ClusterFeatures) -> bool {
        {
            let mut current = lock(&self.features);
            if *current == features {
                return false;
            }
            *current = features;
        }
        for callback in lock(&self.callbacks).iter() {
            callback(features);
        }
        true
    }

    pub fn on_change(&self, callback: impl Fn(ClusterFeatures) + Send + Sync + 'static) {
        lock(&self.callbacks).push(Box::new(callback));
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self) -> anyhow::Result<ClusterFeatures>;
}

/// Probes the API server's discovery endpoints.
pub struct KubeDetector {
    client: Client,
}

impl KubeDetector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Detector for KubeDetector {
    async fn detect(&self) -> anyhow::Result<ClusterFeatures> {
        let prometheus_operator = match self.client.list_api_group_resources(MONITORING_API).await {
            Ok(list) => list.resources.iter().any(|resource| resource.kind == SERVICE_MONITOR_KIND),
            Err(kube::Error::Api(response)) if response.code == 404 => false,
            Err(e) => return Err(e.into()),
        };
        Ok(ClusterFeatures { prometheus_operator })
    }
}

/// Runs one detection and records the result. Detection failures keep the
/// previous value.
pub async fn refresh(detector: &dyn Detector, capabilities: &Capabilities) {
    match detector.detect().await {
        Ok(features) => {
            if capabilities.set(features) {
                info!("Cluster capabilities changed: {:?}", features);
            }
        }
        Err(e) => warn!("Capability detection failed: {:?}", e),
    }
}

/// Refreshes `capabilities` every `period` until `cancel` fires.
pub async fn run(
    detector: Arc<dyn Detector>,
    capabilities: Arc<Capabilities>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = time::interval(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => refresh(detector.as_ref(), &capabilities).await,
        }
    }
    info!("Capability detection stopped");
}
