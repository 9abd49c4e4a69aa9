//! Common resource generation utilities.
//!
//! Provides labels, owner references and metadata shared by every resource
//! generated for a Nexus.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::crd::Nexus;

/// Port the Nexus server listens on.
pub const NEXUS_PORT: i32 = 8081;

/// Name of the data volume mounted at `/nexus-data`.
pub const DATA_VOLUME_NAME: &str = "nexus-data";

/// Standard labels applied to all managed resources
pub fn standard_labels(resource: &Nexus) -> BTreeMap<String, String> {
    let mut labels = pod_selector_labels(resource);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "nexus-operator".to_string(),
    );
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "repository-manager".to_string(),
    );

    // Merge user-defined labels
    for (key, value) in &resource.spec.labels {
        labels.insert(key.clone(), value.clone());
    }

    labels
}

/// Labels used to select the Nexus pod. Never include user labels here:
/// Deployment selectors are immutable.
pub fn pod_selector_labels(resource: &Nexus) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), "nexus".to_string());
    labels.insert(
        "app.kubernetes.io/instance".to_string(),
        resource.name_any(),
    );
    labels
}

/// Create a controller owner reference pointing at a Nexus.
pub fn owner_reference(resource: &Nexus) -> OwnerReference {
    OwnerReference {
        api_version: Nexus::api_version(&()).to_string(),
        kind: Nexus::kind(&()).to_string(),
        name: resource.name_any(),
        uid: resource.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Metadata for a child resource named `name` in the Nexus namespace.
///
/// Owner references are attached when the resource is created, not here.
pub fn child_metadata(resource: &Nexus, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: resource.namespace(),
        labels: Some(standard_labels(resource)),
        ..Default::default()
    }
}
