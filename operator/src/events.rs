use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use log::warn;

pub mod reasons {
    pub const UPGRADE: &str = "Upgrade";
    pub const FAILED_UPGRADE: &str = "FailedUpgrade";
    pub const FAILED_BUILD: &str = "FailedBuild";
}

pub mod actions {
    pub const UPGRADE: &str = "Upgrade";
    pub const RECONCILE: &str = "Reconcile";
}

/// Records Kubernetes events against collector instances.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        reference: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

pub struct KubeEventPublisher {
    client: Client,
    reporter: Reporter,
}

impl KubeEventPublisher {
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: controller.to_string(),
                instance,
            },
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        reference: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), reference.clone());
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        // Events are best effort.
        if let Err(e) = recorder.publish(event).await {
            warn!("Failed to publish {} event for {:?}: {:?}", reason, reference.name, e);
        }
    }
}

#[cfg(test)]
pub use recording::RecordingPublisher;
