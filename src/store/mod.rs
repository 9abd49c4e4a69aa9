//! Access to the cluster store.
//!
//! Every read and write the reconcile engine performs goes through
//! `ClusterStore`. `ApiStore` talks to the API server.

mod api;

use async_trait::async_trait;

use crate::crd::Nexus;
use crate::resources::{ManagedResource, ResourceKey};

pub use api::ApiStore;

/// Operations on child resources and on the Nexus CR.
///
/// Errors are raw `kube::Error`s so callers can classify them (not found,
/// conflict) before wrapping.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch a child resource by identity. Not found is `Ok(None)`.
    async fn get(&self, key: &ResourceKey) -> kube::Result<Option<ManagedResource>>;

    async fn create(&self, resource: &ManagedResource) -> kube::Result<ManagedResource>;

    /// Replace a child resource. The resource version carried by `resource`
    /// must match the stored one.
    async fn update(&self, resource: &ManagedResource) -> kube::Result<ManagedResource>;

    /// Delete a child resource. Deleting something already gone succeeds.
    async fn delete(&self, key: &ResourceKey) -> kube::Result<()>;

    async fn get_nexus(&self, namespace: &str, name: &str) -> kube::Result<Nexus>;

    /// Replace the whole Nexus object (spec and metadata).
    async fn replace_nexus(&self, nexus: &Nexus) -> kube::Result<Nexus>;

    /// Replace the status subresource.
    async fn replace_nexus_status(&self, nexus: &Nexus) -> kube::Result<Nexus>;
}
