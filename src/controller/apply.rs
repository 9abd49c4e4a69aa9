//! Applier: executes deltas against the cluster store.
//!
//! Kinds are applied in `ManagedKind::ALL` order. Within a kind, creates run
//! first, then updates, then deletes, so a singleton is never briefly absent.
//! A failure abandons the rest of that kind; the other kinds still run and
//! the first failure is returned. Nothing is rolled back: the next reconcile
//! recomputes the deltas from whatever state this one left.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{info, warn};

use crate::controller::diff::{DeltaMap, ResourceDelta};
use crate::controller::error::{Error, Result};
use crate::resources::{ManagedKind, ManagedResource, ResourceKey};
use crate::store::ClusterStore;

/// What an apply pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: Vec<ResourceKey>,
    pub updated: Vec<ResourceKey>,
    pub deleted: Vec<ResourceKey>,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Apply every delta, attaching `owner` as controller of created resources.
pub async fn apply(
    store: &dyn ClusterStore,
    owner: &OwnerReference,
    deltas: &DeltaMap,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    let mut first_error = None;

    for kind in ManagedKind::ALL {
        let Some(delta) = deltas.get(&kind).filter(|d| !d.is_empty()) else {
            continue;
        };
        if let Err(e) = apply_kind(store, owner, delta, &mut report).await {
            warn!(kind = %kind, error = %e, "Failed to apply changes");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

async fn apply_kind(
    store: &dyn ClusterStore,
    owner: &OwnerReference,
    delta: &ResourceDelta,
    report: &mut ApplyReport,
) -> Result<()> {
    for resource in &delta.added {
        let key = resource.key();
        let owned = resource.clone().with_owner(owner.clone());
        store
            .create(&owned)
            .await
            .map_err(|source| apply_error("create", &key, source))?;
        info!(resource = %key, "Created resource");
        report.created.push(key);
    }

    for resource in &delta.updated {
        let key = resource.key();
        let owned = ensure_owner(resource.clone(), owner);
        store
            .update(&owned)
            .await
            .map_err(|source| apply_error("update", &key, source))?;
        info!(resource = %key, "Updated resource");
        report.updated.push(key);
    }

    for resource in &delta.removed {
        let key = resource.key();
        store
            .delete(&key)
            .await
            .map_err(|source| apply_error("delete", &key, source))?;
        info!(resource = %key, "Deleted resource");
        report.deleted.push(key);
    }

    Ok(())
}

/// Adopt resources that lost (or never had) an owner reference.
fn ensure_owner(resource: ManagedResource, owner: &OwnerReference) -> ManagedResource {
    let owned = resource
        .metadata()
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == owner.uid));
    if owned {
        resource
    } else {
        resource.with_owner(owner.clone())
    }
}

fn apply_error(action: &'static str, key: &ResourceKey, source: kube::Error) -> Error {
    Error::Apply {
        action,
        key: key.clone(),
        source,
    }
}
