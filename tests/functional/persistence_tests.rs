//! Optimistic-concurrency scenarios on the Nexus CR.

use std::time::Duration;

use nexus_operator::controller::error::Error;
use nexus_operator::controller::persist::{RetryPolicy, persist_spec, persist_status};
use nexus_operator::crd::{NEXUS_COMMUNITY_IMAGE, Nexus, NexusPhase, NexusSpec, NexusStatus};

use crate::Harness;
use crate::common::fixtures::NexusBuilder;
use crate::mock_store::MemoryStore;

const NS: &str = "tools";
const NAME: &str = "nexus3";

#[tokio::test(start_paused = true)]
async fn test_status_conflict_is_retried() {
    let h = Harness::kubernetes();
    h.apply(NexusBuilder::new(NAME).namespace(NS).build());
    h.store.inject_status_conflicts(1);

    h.reconcile(NS, NAME).await.unwrap();

    assert_eq!(h.store.status_writes(), 2);
    assert_eq!(h.phase(NS, NAME), NexusPhase::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_spec_conflict_is_retried() {
    let h = Harness::kubernetes();
    h.apply(NexusBuilder::new(NAME).namespace(NS).build());
    h.store.inject_spec_conflicts(2);

    h.reconcile(NS, NAME).await.unwrap();

    assert_eq!(h.store.spec_writes(), 3);
    assert_eq!(h.nexus(NS, NAME).spec.image, NEXUS_COMMUNITY_IMAGE);
}

#[tokio::test(start_paused = true)]
async fn test_user_edit_survives_status_retry() {
    let h = Harness::kubernetes();
    h.apply(NexusBuilder::new(NAME).namespace(NS).build());
    h.reconcile(NS, NAME).await.unwrap();

    // The retry must re-read the CR, keeping what the user changed
    h.store.modify_nexus(NS, NAME, |nexus| {
        nexus
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("team".to_string(), "platform".to_string());
    });
    h.store.inject_status_conflicts(1);
    h.reconcile(NS, NAME).await.unwrap();

    let nexus = h.nexus(NS, NAME);
    assert_eq!(
        nexus.metadata.labels.unwrap().get("team").map(String::as_str),
        Some("platform")
    );
    assert!(nexus.status.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_status_retries_do_not_fail_the_reconcile() {
    let h = Harness::kubernetes();
    h.apply(NexusBuilder::new(NAME).namespace(NS).build());
    h.store.inject_status_conflicts(usize::MAX);

    let result = h.reconcile(NS, NAME).await;

    assert!(result.is_ok());
    assert!(h.store.status_writes() > 1);
    assert!(h.nexus(NS, NAME).status.is_none());
    // Children were still applied
    assert!(!h.store.resources().is_empty());
}

fn stored(store: &MemoryStore) -> Nexus {
    let mut nexus = Nexus::new(
        NAME,
        NexusSpec {
            image: "docker.io/sonatype/nexus3:3.28.1".to_string(),
            ..Default::default()
        },
    );
    nexus.metadata.namespace = Some(NS.to_string());
    store.insert_nexus(nexus);
    store.nexus(NS, NAME).unwrap()
}

fn with_phase(mut nexus: Nexus, phase: NexusPhase) -> Nexus {
    nexus.status = Some(NexusStatus {
        nexus_status: phase,
        ..Default::default()
    });
    nexus
}

#[tokio::test(start_paused = true)]
async fn test_status_conflict_retries_once() {
    let store = MemoryStore::new();
    let desired = with_phase(stored(&store), NexusPhase::Ok);
    store.inject_status_conflicts(1);

    let written = persist_status(&store, &desired, RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(store.status_writes(), 2);
    assert_eq!(written.status.unwrap().nexus_status, NexusPhase::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_retry_overlays_only_the_target() {
    let store = MemoryStore::new();
    let desired = with_phase(stored(&store), NexusPhase::Ok);
    // Someone else changes the spec after we read the CR
    store.modify_nexus("tools", "nexus3", |n| n.spec.replicas = 0);

    persist_status(&store, &desired, RetryPolicy::default())
        .await
        .unwrap();

    let current = store.nexus("tools", "nexus3").unwrap();
    assert_eq!(current.spec.replicas, 0);
    assert_eq!(current.status.unwrap().nexus_status, NexusPhase::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_spec_persist() {
    let store = MemoryStore::new();
    let mut desired = stored(&store);
    desired.spec.automatic_update.disabled = true;

    persist_spec(&store, &desired, RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(store.spec_writes(), 1);
    assert!(store.nexus("tools", "nexus3").unwrap().spec.automatic_update.disabled);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_conflicts_time_out() {
    let store = MemoryStore::new();
    let desired = with_phase(stored(&store), NexusPhase::Ok);
    store.inject_status_conflicts(usize::MAX);

    let policy = RetryPolicy {
        interval: Duration::from_millis(500),
        timeout: Duration::from_secs(2),
    };
    let err = persist_status(&store, &desired, policy).await.unwrap_err();

    assert!(matches!(err, Error::PersistTimeout { target: "status", .. }));
    assert!(store.status_writes() >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_cr_is_not_retried() {
    let store = MemoryStore::new();
    let mut desired = with_phase(Nexus::new("gone", NexusSpec::default()), NexusPhase::Ok);
    desired.metadata.namespace = Some("tools".to_string());

    let err = persist_status(&store, &desired, RetryPolicy::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
