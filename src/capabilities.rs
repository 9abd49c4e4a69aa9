//! Cluster capability discovery.
//!
//! The operator needs to know whether OpenShift Routes and Kubernetes
//! Ingresses can be served, and whether it runs on OpenShift. Answers come
//! from API discovery and are cached for the life of the process.

use async_trait::async_trait;
use kube::Client;
use kube::discovery::Discovery;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

const ROUTE_GROUP: &str = "route.openshift.io";
const NETWORKING_GROUP: &str = "networking.k8s.io";
const OPENSHIFT_CONFIG_GROUP: &str = "config.openshift.io";

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("API discovery failed: {0}")]
    Discovery(#[from] kube::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// What the cluster can serve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub route_available: bool,
    pub ingress_available: bool,
    pub openshift: bool,
}

#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn route_available(&self) -> Result<bool, CapabilityError>;
    async fn ingress_available(&self) -> Result<bool, CapabilityError>;
    async fn is_openshift(&self) -> Result<bool, CapabilityError>;

    /// All three answers, failing on the first provider error.
    async fn capabilities(&self) -> Result<Capabilities, CapabilityError> {
        Ok(Capabilities {
            route_available: self.route_available().await?,
            ingress_available: self.ingress_available().await?,
            openshift: self.is_openshift().await?,
        })
    }

    /// All three answers, with provider errors read as `false`.
    async fn capabilities_or_default(&self) -> Capabilities {
        let degrade = |what: &str, result: Result<bool, CapabilityError>| {
            result.unwrap_or_else(|e| {
                warn!(capability = what, error = %e, "Capability check failed, assuming unavailable");
                false
            })
        };
        Capabilities {
            route_available: degrade("route", self.route_available().await),
            ingress_available: degrade("ingress", self.ingress_available().await),
            openshift: degrade("openshift", self.is_openshift().await),
        }
    }
}

/// Capability provider backed by the API server's discovery endpoints.
pub struct DiscoveryCapabilities {
    client: Client,
    cache: OnceCell<Capabilities>,
}

impl DiscoveryCapabilities {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: OnceCell::new(),
        }
    }

    async fn discovered(&self) -> Result<Capabilities, CapabilityError> {
        self.cache
            .get_or_try_init(|| async {
                let discovery = Discovery::new(self.client.clone())
                    .filter(&[ROUTE_GROUP, NETWORKING_GROUP, OPENSHIFT_CONFIG_GROUP])
                    .run()
                    .await?;
                let capabilities = Capabilities {
                    route_available: discovery.has_group(ROUTE_GROUP),
                    ingress_available: discovery
                        .get(NETWORKING_GROUP)
                        .and_then(|group| group.recommended_kind("Ingress"))
                        .is_some(),
                    openshift: discovery.has_group(OPENSHIFT_CONFIG_GROUP),
                };
                info!(
                    route = capabilities.route_available,
                    ingress = capabilities.ingress_available,
                    openshift = capabilities.openshift,
                    "Discovered cluster capabilities"
                );
                Ok::<_, CapabilityError>(capabilities)
            })
            .await
            .copied()
    }
}

#[async_trait]
impl CapabilityProvider for DiscoveryCapabilities {
    async fn route_available(&self) -> Result<bool, CapabilityError> {
        Ok(self.discovered().await?.route_available)
    }

    async fn ingress_available(&self) -> Result<bool, CapabilityError> {
        Ok(self.discovered().await?.ingress_available)
    }

    async fn is_openshift(&self) -> Result<bool, CapabilityError> {
        Ok(self.discovered().await?.openshift)
    }
}

/// Fixed answers, or a fixed failure. Used for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct StaticCapabilities {
    pub capabilities: Capabilities,
    pub failure: Option<String>,
}

impl StaticCapabilities {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            failure: None,
        }
    }

    /// Kubernetes with an ingress controller.
    pub fn kubernetes() -> Self {
        Self::new(Capabilities {
            route_available: false,
            ingress_available: true,
            openshift: false,
        })
    }

    /// OpenShift with routes and ingresses.
    pub fn openshift() -> Self {
        Self::new(Capabilities {
            route_available: true,
            ingress_available: true,
            openshift: true,
        })
    }

    /// A provider failing every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            capabilities: Capabilities::default(),
            failure: Some(message.into()),
        }
    }

    fn answer(&self, value: bool) -> Result<bool, CapabilityError> {
        match &self.failure {
            Some(message) => Err(CapabilityError::Unavailable(message.clone())),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl CapabilityProvider for StaticCapabilities {
    async fn route_available(&self) -> Result<bool, CapabilityError> {
        self.answer(self.capabilities.route_available)
    }

    async fn ingress_available(&self) -> Result<bool, CapabilityError> {
        self.answer(self.capabilities.ingress_available)
    }

    async fn is_openshift(&self) -> Result<bool, CapabilityError> {
        self.answer(self.capabilities.openshift)
    }
}
