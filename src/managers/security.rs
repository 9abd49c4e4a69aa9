//! Manager for the pod identity and the operator user credentials.

use async_trait::async_trait;
use kube::ResourceExt;

use super::{ResourceManager, fetch_existing};
use crate::controller::error::Result;
use crate::crd::Nexus;
use crate::resources::compare::{EqualityFn, secret_equality};
use crate::resources::security::{generate_secret, generate_service_account};
use crate::resources::{ManagedKind, ManagedResource, ResourceKey};
use crate::store::ClusterStore;

pub struct SecurityManager {
    nexus: Nexus,
}

impl SecurityManager {
    pub fn new(nexus: &Nexus) -> Self {
        Self {
            nexus: nexus.clone(),
        }
    }
}

#[async_trait]
impl ResourceManager for SecurityManager {
    fn name(&self) -> &'static str {
        "security"
    }

    fn kinds(&self) -> &'static [ManagedKind] {
        &[ManagedKind::ServiceAccount, ManagedKind::Secret]
    }

    fn required_resources(&self) -> Result<Vec<ManagedResource>> {
        Ok(vec![
            ManagedResource::ServiceAccount(generate_service_account(&self.nexus)),
            ManagedResource::Secret(generate_secret(&self.nexus)),
        ])
    }

    async fn deployed_resources(&self, store: &dyn ClusterStore) -> Result<Vec<ManagedResource>> {
        let ns = self.nexus.namespace().unwrap_or_default();
        fetch_existing(
            store,
            [
                ResourceKey::new(
                    ManagedKind::ServiceAccount,
                    ns.clone(),
                    self.nexus.service_account_name(),
                ),
                ResourceKey::new(ManagedKind::Secret, ns, self.nexus.name_any()),
            ],
        )
        .await
    }

    fn custom_equality_for(&self, kind: ManagedKind) -> Option<EqualityFn> {
        (kind == ManagedKind::Secret).then_some(secret_equality as EqualityFn)
    }
}
