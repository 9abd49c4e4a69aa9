//! PersistentVolumeClaim generation for Nexus data.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;

use crate::crd::Nexus;
use crate::resources::common::child_metadata;

/// Generate the data PVC for a Nexus, named after the CR.
pub fn generate_pvc(resource: &Nexus) -> PersistentVolumeClaim {
    let persistence = &resource.spec.persistence;

    PersistentVolumeClaim {
        metadata: child_metadata(resource, resource.name_any()),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: persistence.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(persistence.volume_size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
