//! Resource generation module.
//!
//! Contains the tagged union of child resources the operator manages, their
//! identities, and the generators producing the required state from a Nexus.
//!
//! ## Resources Generated
//!
//! | Resource | Purpose |
//! |----------|---------|
//! | Deployment | Runs the Nexus server |
//! | Service | In-cluster endpoint on port 8081 (NodePort when exposed that way) |
//! | PersistentVolumeClaim | Durable `/nexus-data` |
//! | ServiceAccount | Pod identity |
//! | Secret | Operator user credentials |
//! | Ingress | External access on Kubernetes |
//! | Route | External access on OpenShift |

pub mod common;
pub mod compare;
pub mod deployment;
pub mod ingress;
pub mod pvc;
pub mod quantity;
pub mod route;
pub mod security;
pub mod services;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

pub use common::{owner_reference, standard_labels};
pub use route::Route;

/// Every kind of child resource the operator manages.
///
/// The declaration order is the order in which kinds are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManagedKind {
    ServiceAccount,
    Secret,
    PersistentVolumeClaim,
    Deployment,
    Service,
    Ingress,
    Route,
}

impl ManagedKind {
    /// All kinds in apply order.
    pub const ALL: [ManagedKind; 7] = [
        ManagedKind::ServiceAccount,
        ManagedKind::Secret,
        ManagedKind::PersistentVolumeClaim,
        ManagedKind::Deployment,
        ManagedKind::Service,
        ManagedKind::Ingress,
        ManagedKind::Route,
    ];
}

impl std::fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedKind::ServiceAccount => write!(f, "ServiceAccount"),
            ManagedKind::Secret => write!(f, "Secret"),
            ManagedKind::PersistentVolumeClaim => write!(f, "PersistentVolumeClaim"),
            ManagedKind::Deployment => write!(f, "Deployment"),
            ManagedKind::Service => write!(f, "Service"),
            ManagedKind::Ingress => write!(f, "Ingress"),
            ManagedKind::Route => write!(f, "Route"),
        }
    }
}

/// Identity of a managed resource.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: ManagedKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ManagedKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A child resource, either produced from the Nexus spec (required) or read
/// back from the API server (deployed).
///
/// Required instances never carry a resource version; deployed instances
/// always do.
#[derive(Clone, Debug, PartialEq)]
pub enum ManagedResource {
    ServiceAccount(ServiceAccount),
    Secret(Secret),
    PersistentVolumeClaim(PersistentVolumeClaim),
    Deployment(Deployment),
    Service(Service),
    Ingress(Ingress),
    Route(Route),
}

impl ManagedResource {
    pub fn kind(&self) -> ManagedKind {
        match self {
            ManagedResource::ServiceAccount(_) => ManagedKind::ServiceAccount,
            ManagedResource::Secret(_) => ManagedKind::Secret,
            ManagedResource::PersistentVolumeClaim(_) => ManagedKind::PersistentVolumeClaim,
            ManagedResource::Deployment(_) => ManagedKind::Deployment,
            ManagedResource::Service(_) => ManagedKind::Service,
            ManagedResource::Ingress(_) => ManagedKind::Ingress,
            ManagedResource::Route(_) => ManagedKind::Route,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ManagedResource::ServiceAccount(r) => &r.metadata,
            ManagedResource::Secret(r) => &r.metadata,
            ManagedResource::PersistentVolumeClaim(r) => &r.metadata,
            ManagedResource::Deployment(r) => &r.metadata,
            ManagedResource::Service(r) => &r.metadata,
            ManagedResource::Ingress(r) => &r.metadata,
            ManagedResource::Route(r) => &r.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManagedResource::ServiceAccount(r) => &mut r.metadata,
            ManagedResource::Secret(r) => &mut r.metadata,
            ManagedResource::PersistentVolumeClaim(r) => &mut r.metadata,
            ManagedResource::Deployment(r) => &mut r.metadata,
            ManagedResource::Service(r) => &mut r.metadata,
            ManagedResource::Ingress(r) => &mut r.metadata,
            ManagedResource::Route(r) => &mut r.metadata,
        }
    }

    /// Identity of this resource. Missing metadata fields map to empty strings.
    pub fn key(&self) -> ResourceKey {
        let meta = self.metadata();
        ResourceKey::new(
            self.kind(),
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    /// Concurrency token, present only on deployed instances.
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata().resource_version.as_deref()
    }

    /// Set `owner` as the only owner reference.
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.metadata_mut().owner_references = Some(vec![owner]);
        self
    }

    /// Merge this required resource onto its deployed counterpart.
    ///
    /// The result keeps the required payload, but targets the deployed
    /// object's identity and resource version, and keeps the fields the API
    /// server assigns and refuses to change.
    pub fn merged_onto(self, deployed: &ManagedResource) -> ManagedResource {
        let deployed_meta = deployed.metadata();
        let mut merged = self;
        {
            let meta = merged.metadata_mut();
            meta.resource_version = deployed_meta.resource_version.clone();
            meta.uid = deployed_meta.uid.clone();
            meta.owner_references = deployed_meta.owner_references.clone();
            meta.creation_timestamp = deployed_meta.creation_timestamp.clone();
        }

        match (&mut merged, deployed) {
            (ManagedResource::Service(required), ManagedResource::Service(current)) => {
                if let (Some(spec), Some(current_spec)) = (required.spec.as_mut(), &current.spec) {
                    spec.cluster_ip = current_spec.cluster_ip.clone();
                    spec.cluster_ips = current_spec.cluster_ips.clone();
                }
            }
            (ManagedResource::Secret(required), ManagedResource::Secret(current)) => {
                required.data = current.data.clone();
                required.string_data = None;
            }
            (
                ManagedResource::PersistentVolumeClaim(required),
                ManagedResource::PersistentVolumeClaim(current),
            ) => {
                if let (Some(spec), Some(current_spec)) = (required.spec.as_mut(), &current.spec) {
                    spec.volume_name = current_spec.volume_name.clone();
                    if spec.storage_class_name.is_none() {
                        spec.storage_class_name = current_spec.storage_class_name.clone();
                    }
                    if spec.volume_mode.is_none() {
                        spec.volume_mode = current_spec.volume_mode.clone();
                    }
                }
            }
            _ => {}
        }
        merged
    }
}
