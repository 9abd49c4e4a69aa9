//! Applier and supervisor runs against the in-memory cluster store.

use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use nexus_operator::capabilities::StaticCapabilities;
use nexus_operator::controller::apply::apply;
use nexus_operator::controller::diff::compare;
use nexus_operator::controller::error::Error;
use nexus_operator::controller::supervisor::{Comparator, ResourceMap, Supervisor};
use nexus_operator::crd::{Nexus, NexusSpec};
use nexus_operator::resources::security::generate_secret;
use nexus_operator::resources::{ManagedKind, ManagedResource, ResourceKey};

use crate::mock_store::MemoryStore;

fn owner() -> OwnerReference {
    OwnerReference {
        api_version: "apps.m88i.io/v1alpha1".to_string(),
        kind: "Nexus".to_string(),
        name: "nexus3".to_string(),
        uid: "uid-nexus".to_string(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("tools".to_string()),
        ..Default::default()
    }
}

fn sa(name: &str) -> ManagedResource {
    ManagedResource::ServiceAccount(ServiceAccount {
        metadata: meta(name),
        ..Default::default()
    })
}

fn secret(name: &str) -> ManagedResource {
    ManagedResource::Secret(Secret {
        metadata: meta(name),
        ..Default::default()
    })
}

fn nexus() -> Nexus {
    let mut nexus = Nexus::new(
        "nexus3",
        NexusSpec {
            image: "docker.io/sonatype/nexus3:3.28.1".to_string(),
            ..Default::default()
        },
    );
    nexus.metadata.namespace = Some("tools".to_string());
    nexus.metadata.uid = Some("uid-1".to_string());
    nexus
}

#[tokio::test]
async fn test_creates_with_owner_in_kind_order() {
    let store = MemoryStore::new();
    let required = ResourceMap::from([
        (ManagedKind::Secret, vec![secret("nexus3")]),
        (ManagedKind::ServiceAccount, vec![sa("nexus3")]),
    ]);
    let deltas = compare(&ResourceMap::new(), &required, &Comparator::with_defaults());

    let report = apply(&store, &owner(), &deltas).await.unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(
        store.operations(),
        vec![
            "create ServiceAccount/tools/nexus3".to_string(),
            "create Secret/tools/nexus3".to_string(),
        ]
    );

    let created = store.resource(&report.created[0]).unwrap();
    let refs = created.metadata().owner_references.clone().unwrap();
    assert_eq!(refs[0].uid, "uid-nexus");
    assert_eq!(refs[0].controller, Some(true));
}

#[tokio::test]
async fn test_create_before_delete_within_kind() {
    let store = MemoryStore::new();
    store.insert(sa("old"));
    let deployed = ResourceMap::from([(
        ManagedKind::ServiceAccount,
        vec![store.resource(&sa("old").key()).unwrap()],
    )]);
    let required = ResourceMap::from([(ManagedKind::ServiceAccount, vec![sa("new")])]);
    let deltas = compare(&deployed, &required, &Comparator::with_defaults());

    apply(&store, &owner(), &deltas).await.unwrap();
    assert_eq!(
        store.operations(),
        vec![
            "create ServiceAccount/tools/new".to_string(),
            "delete ServiceAccount/tools/old".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failure_is_reported_and_other_kinds_proceed() {
    let store = MemoryStore::new();
    // Already exists, so the create conflicts
    store.insert(sa("nexus3"));
    let required = ResourceMap::from([
        (ManagedKind::ServiceAccount, vec![sa("nexus3")]),
        (ManagedKind::Secret, vec![secret("nexus3")]),
    ]);
    let deltas = compare(&ResourceMap::new(), &required, &Comparator::with_defaults());

    let err = apply(&store, &owner(), &deltas).await.unwrap_err();
    assert!(matches!(err, Error::Apply { action: "create", .. }));
    assert_eq!(store.operations(), vec!["create Secret/tools/nexus3".to_string()]);
}

#[tokio::test]
async fn test_deployed_resources_skip_missing() {
    let store = MemoryStore::new();
    store.insert(ManagedResource::Secret(generate_secret(&nexus())));

    let mut supervisor = Supervisor::new();
    supervisor
        .init_managers(&nexus(), &StaticCapabilities::openshift())
        .await
        .unwrap();
    let deployed = supervisor.deployed_resources(&store).await.unwrap();

    assert_eq!(deployed.len(), 1);
    assert_eq!(
        deployed[&ManagedKind::Secret][0].key(),
        ResourceKey::new(ManagedKind::Secret, "tools", "nexus3")
    );
}
