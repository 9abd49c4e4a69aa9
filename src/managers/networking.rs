//! Manager for external exposure: an Ingress or an OpenShift Route.

use async_trait::async_trait;
use kube::ResourceExt;

use super::{ResourceManager, fetch_existing};
use crate::capabilities::{Capabilities, CapabilityProvider};
use crate::controller::error::{Error, Result};
use crate::crd::{ExposeType, Nexus};
use crate::resources::compare::EqualityFn;
use crate::resources::ingress::generate_ingress;
use crate::resources::route::generate_route;
use crate::resources::{ManagedKind, ManagedResource, ResourceKey};
use crate::store::ClusterStore;

/// Exposure depends on what the cluster serves, so construction queries the
/// capability provider and fails when it can't answer.
pub struct NetworkingManager {
    nexus: Nexus,
    capabilities: Capabilities,
}

impl NetworkingManager {
    pub async fn new(nexus: &Nexus, provider: &dyn CapabilityProvider) -> Result<Self> {
        let capabilities = provider
            .capabilities()
            .await
            .map_err(|e| Error::Capability(e.to_string()))?;
        Ok(Self {
            nexus: nexus.clone(),
            capabilities,
        })
    }
}

#[async_trait]
impl ResourceManager for NetworkingManager {
    fn name(&self) -> &'static str {
        "networking"
    }

    fn kinds(&self) -> &'static [ManagedKind] {
        &[ManagedKind::Ingress, ManagedKind::Route]
    }

    fn required_resources(&self) -> Result<Vec<ManagedResource>> {
        let networking = &self.nexus.spec.networking;
        if !networking.expose {
            return Ok(Vec::new());
        }

        match networking.expose_as {
            Some(ExposeType::Ingress) if self.capabilities.ingress_available => Ok(vec![
                ManagedResource::Ingress(generate_ingress(&self.nexus)),
            ]),
            Some(ExposeType::Route) if self.capabilities.route_available => {
                Ok(vec![ManagedResource::Route(generate_route(&self.nexus))])
            }
            // The Service carries the node port
            Some(ExposeType::NodePort) => Ok(Vec::new()),
            Some(expose_as) => Err(Error::RequiredResources(format!(
                "cannot expose as {expose_as}: not served by this cluster"
            ))),
            None => Err(Error::RequiredResources(
                "networking.exposeAs is unset".to_string(),
            )),
        }
    }

    async fn deployed_resources(&self, store: &dyn ClusterStore) -> Result<Vec<ManagedResource>> {
        let ns = self.nexus.namespace().unwrap_or_default();
        let name = self.nexus.name_any();

        let mut keys = Vec::new();
        if self.capabilities.ingress_available {
            keys.push(ResourceKey::new(ManagedKind::Ingress, ns.clone(), name.clone()));
        }
        if self.capabilities.route_available {
            keys.push(ResourceKey::new(ManagedKind::Route, ns, name));
        }
        fetch_existing(store, keys).await
    }

    fn custom_equality_for(&self, _kind: ManagedKind) -> Option<EqualityFn> {
        None
    }
}
