//! Kubernetes Event publishing.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails a
//! reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Publishes Events about a Nexus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish event");
        }
    }
}

/// Event reasons shown in `kubectl get events`.
pub mod reasons {
    pub const UPDATE_STARTED: &str = "UpdateStarted";
    pub const UPDATE_SUCCESS: &str = "UpdateSuccess";
    pub const UPDATE_FAILED: &str = "UpdateFailed";
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    pub const SERVER_OPERATIONS_FAILED: &str = "ServerOperationsFailed";
}

/// Event actions.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const UPDATE: &str = "Update";
    pub const ROLLBACK: &str = "Rollback";
    pub const VALIDATE: &str = "Validate";
    pub const SERVER_OPERATIONS: &str = "ServerOperations";
}
