//! Differ: deployed vs. required resources, per kind.

use std::collections::{BTreeMap, BTreeSet};

use crate::controller::supervisor::{Comparator, ResourceMap};
use crate::resources::{ManagedKind, ManagedResource, ResourceKey};

/// Changes needed to turn the deployed resources of one kind into the
/// required ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceDelta {
    /// Required, with no deployed counterpart.
    pub added: Vec<ManagedResource>,
    /// Required payload merged onto the deployed identity and version.
    pub updated: Vec<ManagedResource>,
    /// Deployed, with no required counterpart.
    pub removed: Vec<ManagedResource>,
}

impl ResourceDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Deltas keyed by kind. Kinds without changes are still present.
pub type DeltaMap = BTreeMap<ManagedKind, ResourceDelta>;

/// Compute the delta for every kind present in either map.
///
/// Entries are ordered by identity within each list.
pub fn compare(deployed: &ResourceMap, required: &ResourceMap, comparator: &Comparator) -> DeltaMap {
    let kinds: BTreeSet<ManagedKind> = deployed.keys().chain(required.keys()).copied().collect();
    let empty = Vec::new();

    kinds
        .into_iter()
        .map(|kind| {
            let delta = compare_kind(
                deployed.get(&kind).unwrap_or(&empty),
                required.get(&kind).unwrap_or(&empty),
                comparator,
            );
            (kind, delta)
        })
        .collect()
}

fn index(resources: &[ManagedResource]) -> BTreeMap<ResourceKey, &ManagedResource> {
    resources.iter().map(|r| (r.key(), r)).collect()
}

fn compare_kind(
    deployed: &[ManagedResource],
    required: &[ManagedResource],
    comparator: &Comparator,
) -> ResourceDelta {
    let deployed = index(deployed);
    let required = index(required);
    let mut delta = ResourceDelta::default();

    for (key, wanted) in &required {
        match deployed.get(key) {
            None => delta.added.push((*wanted).clone()),
            Some(current) if !comparator.equal(current, wanted) => {
                delta.updated.push((*wanted).clone().merged_onto(current));
            }
            Some(_) => {}
        }
    }
    for (key, current) in &deployed {
        if !required.contains_key(key) {
            delta.removed.push((*current).clone());
        }
    }
    delta
}

/// Whether no kind has any change.
pub fn is_converged(deltas: &DeltaMap) -> bool {
    deltas.values().all(ResourceDelta::is_empty)
}
