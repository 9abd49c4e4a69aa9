//! Update monitor passes against hand-built Deployments.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use nexus_operator::controller::persist::RetryPolicy;
use nexus_operator::controller::update_monitor::{UpdateMonitor, UpdateOutcome};
use nexus_operator::crd::{AutomaticUpdateSpec, Nexus, NexusSpec, NexusStatus};
use nexus_operator::events::reasons;
use nexus_operator::resources::deployment::generate_deployment;

use crate::mock_events::RecordingEventPublisher;
use crate::mock_store::MemoryStore;

const START: &str = "Starting automatic update from 3.25.0 to 3.25.1";

fn nexus(image: &str) -> Nexus {
    let mut nexus = Nexus::new(
        "nexus3",
        NexusSpec {
            image: image.to_string(),
            automatic_update: AutomaticUpdateSpec {
                disabled: false,
                minor_version: Some(25),
            },
            ..Default::default()
        },
    );
    nexus.metadata.namespace = Some("tools".to_string());
    nexus
}

fn deployment(image: &str, condition: Option<(&str, &str)>) -> Deployment {
    let mut deployment = generate_deployment(&nexus(image));
    deployment.status = condition.map(|(status, reason)| DeploymentStatus {
        conditions: Some(vec![DeploymentCondition {
            type_: "Progressing".to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    });
    deployment
}

fn with_log(mut nexus: Nexus, log: &[&str]) -> Nexus {
    nexus.status = Some(NexusStatus {
        update_conditions: log.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    nexus
}

#[tokio::test]
async fn test_new_update_starts_tracking() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = nexus("img:3.25.1");
    let outcome = monitor
        .monitor(
            &mut cr,
            Some(&deployment("img:3.25.0", None)),
            &deployment("img:3.25.1", None),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::Started { .. }));
    assert_eq!(cr.update_conditions(), [START.to_string()]);
    assert_eq!(events.count(reasons::UPDATE_STARTED), 1);
}

#[tokio::test]
async fn test_newer_target_supersedes_tracking() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = with_log(nexus("img:3.25.2"), &[START]);
    monitor
        .monitor(
            &mut cr,
            Some(&deployment("img:3.25.1", None)),
            &deployment("img:3.25.2", None),
        )
        .await
        .unwrap();

    assert_eq!(
        cr.update_conditions(),
        ["Starting automatic update from 3.25.1 to 3.25.2".to_string()]
    );
}

#[tokio::test]
async fn test_untrackable_images_clear_the_log() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    for (deployed, required) in [
        ("other:3.25.0", "img:3.25.1"),
        ("img:latest", "img:3.25.1"),
        ("img", "img:3.25.1"),
        ("img:3.25.0", "img:nightly"),
    ] {
        let mut cr = with_log(nexus(required), &[START]);
        let outcome = monitor
            .monitor(&mut cr, Some(&deployment(deployed, None)), &deployment(required, None))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Untracked, "{deployed} -> {required}");
        assert!(cr.update_conditions().is_empty());
    }
    assert!(events.events().is_empty());
}

#[tokio::test]
async fn test_disabled_updates_clear_the_log() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = with_log(nexus("img:3.25.1"), &[START]);
    cr.spec.automatic_update.disabled = true;
    let outcome = monitor
        .monitor(
            &mut cr,
            Some(&deployment("img:3.25.0", None)),
            &deployment("img:3.25.1", None),
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Untracked);
    assert!(cr.update_conditions().is_empty());
}

#[tokio::test]
async fn test_success_is_recorded_once() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = with_log(nexus("img:3.25.1"), &[START]);
    let deployed = deployment("img:3.25.1", Some(("True", "NewReplicaSetAvailable")));
    let required = deployment("img:3.25.1", None);

    let outcome = monitor.monitor(&mut cr, Some(&deployed), &required).await.unwrap();
    assert!(matches!(outcome, UpdateOutcome::Succeeded { .. }));
    assert_eq!(cr.update_conditions().len(), 2);
    assert_eq!(
        cr.update_conditions()[1],
        "Successfully updated from 3.25.0 to 3.25.1"
    );

    // The terminal record stays as history
    let outcome = monitor.monitor(&mut cr, Some(&deployed), &required).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Idle);
    assert_eq!(cr.update_conditions().len(), 2);
    assert_eq!(events.count(reasons::UPDATE_SUCCESS), 1);
}

#[tokio::test]
async fn test_stale_condition_is_not_success() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = with_log(nexus("img:3.25.1"), &[START]);
    let mut deployed = deployment("img:3.25.1", Some(("True", "NewReplicaSetAvailable")));
    deployed.metadata.generation = Some(3);
    deployed.status.as_mut().unwrap().observed_generation = Some(2);

    let outcome = monitor
        .monitor(&mut cr, Some(&deployed), &deployment("img:3.25.1", None))
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::InProgress);
    assert_eq!(cr.update_conditions(), [START.to_string()]);
}

#[tokio::test]
async fn test_failed_rollout_rolls_back() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = store.insert_nexus(with_log(nexus("img:3.25.1"), &[START]));
    let deployed = deployment("img:3.25.1", Some(("False", "ProgressDeadlineExceeded")));

    let outcome = monitor
        .monitor(&mut cr, Some(&deployed), &deployment("img:3.25.1", None))
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::RolledBack { .. }));
    assert_eq!(cr.update_conditions()[1], "Failed to update from 3.25.0 to 3.25.1");

    let stored = store.nexus("tools", "nexus3").unwrap();
    assert!(stored.spec.automatic_update.disabled);
    assert_eq!(stored.spec.automatic_update.minor_version, None);
    assert_eq!(stored.spec.image, "img:3.25.0");
    assert_eq!(cr.spec, stored.spec);

    assert_eq!(events.count(reasons::UPDATE_FAILED), 1);
    assert!(events.events()[0].warning);
}

#[tokio::test]
async fn test_rollback_persist_failure_is_fatal_and_silent() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    // Never stored, so the spec write fails with not found
    let mut cr = with_log(nexus("img:3.25.1"), &[START]);
    let deployed = deployment("img:3.25.1", Some(("False", "ProgressDeadlineExceeded")));

    let err = monitor
        .monitor(&mut cr, Some(&deployed), &deployment("img:3.25.1", None))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(cr.update_conditions(), [START.to_string()]);
    assert!(events.events().is_empty());
}

#[tokio::test]
async fn test_tampered_log_is_discarded() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let mut cr = with_log(nexus("img:3.25.1"), &["Starting automatic update from 3.25.0"]);
    let outcome = monitor
        .monitor(
            &mut cr,
            Some(&deployment("img:3.25.1", None)),
            &deployment("img:3.25.1", None),
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Idle);
    assert!(cr.update_conditions().is_empty());
}

#[tokio::test]
async fn test_unrecognized_entry_is_left_alone() {
    let store = MemoryStore::new();
    let events = RecordingEventPublisher::new();
    let monitor = UpdateMonitor::new(&store, &events, RetryPolicy::default());

    let log = [START, "Updated by hand"];
    let mut cr = with_log(nexus("img:3.25.1"), &log);
    let outcome = monitor
        .monitor(
            &mut cr,
            Some(&deployment("img:3.25.1", None)),
            &deployment("img:3.25.1", None),
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Idle);
    assert_eq!(cr.update_conditions(), log.map(String::from));
}
