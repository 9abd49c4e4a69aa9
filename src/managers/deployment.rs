//! Manager for the Nexus workload: its Deployment and Service.

use async_trait::async_trait;
use kube::ResourceExt;

use super::{ResourceManager, fetch_existing};
use crate::controller::error::Result;
use crate::crd::Nexus;
use crate::resources::compare::{EqualityFn, deployment_equality, service_equality};
use crate::resources::deployment::generate_deployment;
use crate::resources::services::generate_service;
use crate::resources::{ManagedKind, ManagedResource, ResourceKey};
use crate::store::ClusterStore;

pub struct DeploymentManager {
    nexus: Nexus,
}

impl DeploymentManager {
    pub fn new(nexus: &Nexus) -> Self {
        Self {
            nexus: nexus.clone(),
        }
    }
}

#[async_trait]
impl ResourceManager for DeploymentManager {
    fn name(&self) -> &'static str {
        "deployment"
    }

    fn kinds(&self) -> &'static [ManagedKind] {
        &[ManagedKind::Deployment, ManagedKind::Service]
    }

    fn required_resources(&self) -> Result<Vec<ManagedResource>> {
        Ok(vec![
            ManagedResource::Deployment(generate_deployment(&self.nexus)),
            ManagedResource::Service(generate_service(&self.nexus)),
        ])
    }

    async fn deployed_resources(&self, store: &dyn ClusterStore) -> Result<Vec<ManagedResource>> {
        let ns = self.nexus.namespace().unwrap_or_default();
        let name = self.nexus.name_any();
        fetch_existing(
            store,
            self.kinds()
                .iter()
                .copied()
                .map(|kind| ResourceKey::new(kind, ns.clone(), name.clone())),
        )
        .await
    }

    fn custom_equality_for(&self, kind: ManagedKind) -> Option<EqualityFn> {
        match kind {
            ManagedKind::Deployment => Some(deployment_equality as EqualityFn),
            ManagedKind::Service => Some(service_equality as EqualityFn),
            _ => None,
        }
    }
}
