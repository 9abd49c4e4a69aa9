//! Shared context for the controller.
//!
//! The Context holds the collaborators every reconcile uses: the cluster
//! store, the event publisher, the capability provider, the image tag
//! source and the Nexus REST client. Each sits behind a trait so tests can
//! swap in the in-memory versions.

use std::sync::Arc;

use kube::Client;

use crate::capabilities::{CapabilityProvider, DiscoveryCapabilities};
use crate::config::OperatorConfig;
use crate::controller::error::Result;
use crate::controller::persist::RetryPolicy;
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::health::HealthState;
use crate::server::{RestServerOperator, ServerOperator};
use crate::store::{ApiStore, ClusterStore};
use crate::tags::{DEFAULT_RETRY_INTERVAL, DockerHubFetcher, TagCache, TagSource};
use crate::OPERATOR_NAME;

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn ClusterStore>,
    pub events: Arc<dyn EventPublisher>,
    pub capabilities: Arc<dyn CapabilityProvider>,
    pub tags: Arc<dyn TagSource>,
    pub server: Arc<dyn ServerOperator>,
    /// Bounds for conflict-retried writes to the Nexus object
    pub retry: RetryPolicy,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    /// Wire every collaborator to the API server behind `client`.
    pub fn new(
        client: Client,
        config: &OperatorConfig,
        health_state: Option<Arc<HealthState>>,
    ) -> Result<Self> {
        let tags = TagCache::with_intervals(
            DockerHubFetcher::new()?,
            config.tag_refresh_interval,
            DEFAULT_RETRY_INTERVAL,
        );
        Ok(Self {
            store: Arc::new(ApiStore::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(
                client.clone(),
                OPERATOR_NAME,
                Some(config.pod_name.clone()),
            )),
            capabilities: Arc::new(DiscoveryCapabilities::new(client)),
            tags: Arc::new(tags),
            server: Arc::new(RestServerOperator::new()?),
            retry: RetryPolicy::default(),
            health_state,
        })
    }
}
