//! Manager for the data volume claim.

use async_trait::async_trait;
use kube::ResourceExt;

use super::{ResourceManager, fetch_existing};
use crate::controller::error::Result;
use crate::crd::Nexus;
use crate::resources::compare::{EqualityFn, pvc_equality};
use crate::resources::pvc::generate_pvc;
use crate::resources::{ManagedKind, ManagedResource, ResourceKey};
use crate::store::ClusterStore;

/// Requires a PVC only when persistence is enabled. A PVC left behind after
/// persistence is turned off is removed.
pub struct PersistenceManager {
    nexus: Nexus,
}

impl PersistenceManager {
    pub fn new(nexus: &Nexus) -> Self {
        Self {
            nexus: nexus.clone(),
        }
    }
}

#[async_trait]
impl ResourceManager for PersistenceManager {
    fn name(&self) -> &'static str {
        "persistence"
    }

    fn kinds(&self) -> &'static [ManagedKind] {
        &[ManagedKind::PersistentVolumeClaim]
    }

    fn required_resources(&self) -> Result<Vec<ManagedResource>> {
        if !self.nexus.spec.persistence.persistent {
            return Ok(Vec::new());
        }
        Ok(vec![ManagedResource::PersistentVolumeClaim(generate_pvc(
            &self.nexus,
        ))])
    }

    async fn deployed_resources(&self, store: &dyn ClusterStore) -> Result<Vec<ManagedResource>> {
        let key = ResourceKey::new(
            ManagedKind::PersistentVolumeClaim,
            self.nexus.namespace().unwrap_or_default(),
            self.nexus.name_any(),
        );
        fetch_existing(store, [key]).await
    }

    fn custom_equality_for(&self, kind: ManagedKind) -> Option<EqualityFn> {
        (kind == ManagedKind::PersistentVolumeClaim).then_some(pvc_equality as EqualityFn)
    }
}
