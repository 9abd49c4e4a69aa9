//! Supervisor: aggregates the resource managers.
//!
//! Merges each manager's required and deployed resources into maps keyed by
//! kind, and builds the composite comparator from the default equality plus
//! the managers' overrides.

use std::collections::BTreeMap;

use tracing::debug;

use crate::capabilities::CapabilityProvider;
use crate::controller::error::{Error, Result};
use crate::crd::Nexus;
use crate::managers::{
    DeploymentManager, NetworkingManager, PersistenceManager, ResourceManager, SecurityManager,
};
use crate::resources::compare::{EqualityFn, default_equality};
use crate::resources::{ManagedKind, ManagedResource};
use crate::store::ClusterStore;

/// Resources grouped by kind.
pub type ResourceMap = BTreeMap<ManagedKind, Vec<ManagedResource>>;

/// Per-kind equality dispatch.
#[derive(Clone)]
pub struct Comparator {
    table: BTreeMap<ManagedKind, EqualityFn>,
}

impl Comparator {
    /// Every kind compared with the default equality.
    pub fn with_defaults() -> Self {
        Self {
            table: ManagedKind::ALL
                .iter()
                .map(|kind| (*kind, default_equality as EqualityFn))
                .collect(),
        }
    }

    pub fn for_kind(&self, kind: ManagedKind) -> EqualityFn {
        self.table
            .get(&kind)
            .copied()
            .unwrap_or(default_equality as EqualityFn)
    }

    /// `eq(deployed, required)` for the kind of `required`.
    pub fn equal(&self, deployed: &ManagedResource, required: &ManagedResource) -> bool {
        (self.for_kind(required.kind()))(deployed, required)
    }
}

/// Owns the managers for one reconcile.
#[derive(Default)]
pub struct Supervisor {
    managers: Vec<Box<dyn ResourceManager>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A supervisor over an explicit manager list.
    pub fn with_managers(managers: Vec<Box<dyn ResourceManager>>) -> Result<Self> {
        check_exclusive_ownership(&managers)?;
        Ok(Self { managers })
    }

    /// Build the four managers for `nexus`. A manager construction failure
    /// aborts initialization.
    pub async fn init_managers(
        &mut self,
        nexus: &Nexus,
        capabilities: &dyn CapabilityProvider,
    ) -> Result<()> {
        let managers: Vec<Box<dyn ResourceManager>> = vec![
            Box::new(SecurityManager::new(nexus)),
            Box::new(PersistenceManager::new(nexus)),
            Box::new(DeploymentManager::new(nexus)),
            Box::new(NetworkingManager::new(nexus, capabilities).await?),
        ];
        check_exclusive_ownership(&managers)?;
        self.managers = managers;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.managers.is_empty() {
            return Err(Error::ManagerConfig(
                "managers are not initialized".to_string(),
            ));
        }
        Ok(())
    }

    /// Required resources of every manager, by kind.
    pub fn required_resources(&self) -> Result<ResourceMap> {
        self.ensure_initialized()?;
        let mut required = ResourceMap::new();
        for manager in &self.managers {
            for resource in manager.required_resources()? {
                required.entry(resource.kind()).or_default().push(resource);
            }
        }
        Ok(required)
    }

    /// Deployed resources of every manager, by kind. Stops at the first
    /// manager error.
    pub async fn deployed_resources(&self, store: &dyn ClusterStore) -> Result<ResourceMap> {
        self.ensure_initialized()?;
        let mut deployed = ResourceMap::new();
        for manager in &self.managers {
            let resources = manager.deployed_resources(store).await?;
            debug!(
                manager = manager.name(),
                count = resources.len(),
                "Fetched deployed resources"
            );
            for resource in resources {
                deployed.entry(resource.kind()).or_default().push(resource);
            }
        }
        Ok(deployed)
    }

    /// Default equality for every kind, overridden by the managers. Two
    /// managers overriding the same kind is a configuration error.
    pub fn comparator(&self) -> Result<Comparator> {
        self.ensure_initialized()?;
        let mut comparator = Comparator::with_defaults();
        let mut overridden_by: BTreeMap<ManagedKind, &'static str> = BTreeMap::new();

        for manager in &self.managers {
            for kind in ManagedKind::ALL {
                let Some(eq) = manager.custom_equality_for(kind) else {
                    continue;
                };
                if let Some(previous) = overridden_by.insert(kind, manager.name()) {
                    return Err(Error::ManagerConfig(format!(
                        "managers {previous} and {} both override equality for {kind}",
                        manager.name()
                    )));
                }
                comparator.table.insert(kind, eq);
            }
        }
        Ok(comparator)
    }
}

fn check_exclusive_ownership(managers: &[Box<dyn ResourceManager>]) -> Result<()> {
    let mut owners: BTreeMap<ManagedKind, &'static str> = BTreeMap::new();
    for manager in managers {
        for kind in manager.kinds() {
            if let Some(previous) = owners.insert(*kind, manager.name()) {
                return Err(Error::ManagerConfig(format!(
                    "managers {previous} and {} both own {kind}",
                    manager.name()
                )));
            }
        }
    }
    Ok(())
}
