//! Resource managers.
//!
//! Each manager is authoritative for a fixed set of child kinds. For one
//! Nexus it produces the required resources of those kinds, fetches the
//! deployed ones, and may override the equality used to compare them.
//!
//! | Manager | Kinds |
//! |---------|-------|
//! | deployment | Deployment, Service |
//! | persistence | PersistentVolumeClaim |
//! | security | ServiceAccount, Secret |
//! | networking | Ingress, Route |

mod deployment;
mod networking;
mod persistence;
mod security;

pub use deployment::DeploymentManager;
pub use networking::NetworkingManager;
pub use persistence::PersistenceManager;
pub use security::SecurityManager;

use async_trait::async_trait;

use crate::controller::error::{Error, Result};
use crate::resources::ManagedResource;
use crate::resources::compare::EqualityFn;
use crate::resources::{ManagedKind, ResourceKey};
use crate::store::ClusterStore;

#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Kinds this manager is authoritative for.
    fn kinds(&self) -> &'static [ManagedKind];

    /// Resources the Nexus needs. Pure; an error means the CR holds a
    /// combination defaulting should have rejected.
    fn required_resources(&self) -> Result<Vec<ManagedResource>>;

    /// Resources currently deployed, fetched by identity. Absent resources
    /// are omitted.
    async fn deployed_resources(&self, store: &dyn ClusterStore) -> Result<Vec<ManagedResource>>;

    /// Equality override for `kind`, if any.
    fn custom_equality_for(&self, kind: ManagedKind) -> Option<EqualityFn>;
}

/// Fetch each key, skipping the ones that don't exist.
pub(crate) async fn fetch_existing(
    store: &dyn ClusterStore,
    keys: impl IntoIterator<Item = ResourceKey>,
) -> Result<Vec<ManagedResource>> {
    let mut found = Vec::new();
    for key in keys {
        match store.get(&key).await {
            Ok(Some(resource)) => found.push(resource),
            Ok(None) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(source) => return Err(Error::Fetch { key, source }),
        }
    }
    Ok(found)
}
