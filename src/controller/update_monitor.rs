//! Automatic update monitor.
//!
//! Runs after the applier on every reconcile. Compares the image of the
//! deployed Deployment with the freshly generated one to detect a new
//! automatic update, then follows the rollout through the Deployment's
//! `Progressing` condition. A failed rollout is rolled back by pinning the
//! CR to the previous tag and disabling automatic updates.
//!
//! Transitions, first match wins:
//!
//! 1. Not trackable (updates disabled, repository changed, tag missing,
//!    `latest` or unparseable): clear the log.
//! 2. Required tag newer than deployed: start tracking, replacing the log.
//! 3. Last log entry is not a start record: nothing to do.
//! 4. Tracking: drop a start record that doesn't parse, otherwise watch
//!    the rollout for success or failure.

use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use crate::controller::error::Result;
use crate::controller::persist::{RetryPolicy, persist_spec};
use crate::controller::update_state::UpdateState;
use crate::crd::Nexus;
use crate::events::{EventPublisher, actions, reasons};
use crate::resources::deployment::nexus_image;
use crate::store::ClusterStore;
use crate::version::{VersionTag, split_image, with_tag};

const PROGRESSING: &str = "Progressing";
const NEW_REPLICA_SET_AVAILABLE: &str = "NewReplicaSetAvailable";

/// What one monitor pass did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Updates can't be tracked for this CR; the log is empty.
    Untracked,
    /// Nothing in flight.
    Idle,
    /// A new update started.
    Started { previous: String, target: String },
    /// The tracked rollout hasn't finished.
    InProgress,
    /// The tracked rollout finished.
    Succeeded { previous: String, target: String },
    /// The tracked rollout failed and the CR was pinned to `previous`.
    RolledBack { previous: String, target: String },
}

impl UpdateOutcome {
    /// Metric label for terminal and start outcomes.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            UpdateOutcome::Started { .. } => Some("started"),
            UpdateOutcome::Succeeded { .. } => Some("succeeded"),
            UpdateOutcome::RolledBack { .. } => Some("rolled_back"),
            _ => None,
        }
    }
}

enum Rollout {
    Failed,
    Complete,
    Progressing,
}

/// Follows automatic updates of one CR at a time.
pub struct UpdateMonitor<'a> {
    store: &'a dyn ClusterStore,
    events: &'a dyn EventPublisher,
    retry: RetryPolicy,
}

impl<'a> UpdateMonitor<'a> {
    pub fn new(store: &'a dyn ClusterStore, events: &'a dyn EventPublisher, retry: RetryPolicy) -> Self {
        Self { store, events, retry }
    }

    /// Run one pass. `nexus.status.updateConditions` is updated in memory
    /// only; the caller persists status. A rollback persists the spec
    /// itself, and a failure to do so is returned without notifying.
    pub async fn monitor(
        &self,
        nexus: &mut Nexus,
        deployed: Option<&Deployment>,
        required: &Deployment,
    ) -> Result<UpdateOutcome> {
        let Some((deployed_tag, required_tag)) = trackable(nexus, deployed, required) else {
            clear_log(nexus);
            return Ok(UpdateOutcome::Untracked);
        };

        if required_tag.1.release_cmp(&deployed_tag.1) == Ordering::Greater {
            let state = UpdateState::Updating {
                previous: deployed_tag.0.clone(),
                target: required_tag.0.clone(),
            };
            info!(
                name = %nexus.name_any(),
                previous = %deployed_tag.0,
                target = %required_tag.0,
                "Starting automatic update"
            );
            set_log(nexus, vec![state.to_string()]);
            self.notify(
                nexus,
                EventType::Normal,
                reasons::UPDATE_STARTED,
                actions::UPDATE,
                state.to_string(),
            )
            .await;
            return Ok(UpdateOutcome::Started {
                previous: deployed_tag.0,
                target: required_tag.0,
            });
        }

        // Only a start record means an update is in flight
        let Some(last) = nexus
            .update_conditions()
            .last()
            .filter(|entry| UpdateState::is_start_entry(entry))
        else {
            return Ok(UpdateOutcome::Idle);
        };
        let (previous, target) = match UpdateState::parse_entry(last) {
            Ok(UpdateState::Updating { previous, target }) => (previous, target),
            Ok(_) => return Ok(UpdateOutcome::Idle),
            Err(e) => {
                warn!(name = %nexus.name_any(), error = %e, "Discarding update log");
                clear_log(nexus);
                return Ok(UpdateOutcome::Idle);
            }
        };

        match rollout(deployed, &target) {
            Rollout::Progressing => {
                debug!(name = %nexus.name_any(), %target, "Update still rolling out");
                Ok(UpdateOutcome::InProgress)
            }
            Rollout::Complete => {
                let state = UpdateState::Succeeded {
                    previous: previous.clone(),
                    target: target.clone(),
                };
                info!(name = %nexus.name_any(), %previous, %target, "Automatic update succeeded");
                push_log(nexus, state.to_string());
                self.notify(
                    nexus,
                    EventType::Normal,
                    reasons::UPDATE_SUCCESS,
                    actions::UPDATE,
                    state.to_string(),
                )
                .await;
                Ok(UpdateOutcome::Succeeded { previous, target })
            }
            Rollout::Failed => {
                self.roll_back(nexus, &previous).await?;
                let state = UpdateState::Failed {
                    previous: previous.clone(),
                    target: target.clone(),
                };
                warn!(name = %nexus.name_any(), %previous, %target, "Automatic update failed, rolled back");
                push_log(nexus, state.to_string());
                self.notify(
                    nexus,
                    EventType::Warning,
                    reasons::UPDATE_FAILED,
                    actions::ROLLBACK,
                    format!(
                        "{state}. Automatic updates are disabled and the image is pinned to {previous}"
                    ),
                )
                .await;
                Ok(UpdateOutcome::RolledBack { previous, target })
            }
        }
    }

    async fn roll_back(&self, nexus: &mut Nexus, previous: &str) -> Result<()> {
        let mut desired = nexus.clone();
        let update = &mut desired.spec.automatic_update;
        update.disabled = true;
        update.minor_version = None;
        desired.spec.image = with_tag(&nexus.spec.image, previous);

        let stored = persist_spec(self.store, &desired, self.retry).await?;
        nexus.metadata = stored.metadata;
        nexus.spec = stored.spec;
        Ok(())
    }

    async fn notify(&self, nexus: &Nexus, type_: EventType, reason: &str, action: &str, note: String) {
        self.events
            .publish(&nexus.object_ref(&()), type_, reason, action, Some(note))
            .await;
    }
}

type Tag = (String, VersionTag);

/// Deployed and required tags, when the update can be tracked.
fn trackable(nexus: &Nexus, deployed: Option<&Deployment>, required: &Deployment) -> Option<(Tag, Tag)> {
    if nexus.spec.automatic_update.disabled {
        return None;
    }
    let (deployed_repository, deployed_tag) = split_image(nexus_image(deployed?)?);
    let (required_repository, required_tag) = split_image(nexus_image(required)?);
    if deployed_repository != required_repository {
        return None;
    }
    let (deployed_tag, required_tag) = (deployed_tag?, required_tag?);
    if deployed_tag == "latest" {
        return None;
    }

    let parse = |tag: &str| match VersionTag::parse(tag) {
        Ok(version) => Some((tag.to_string(), version)),
        Err(e) => {
            debug!(error = %e, "Image tag is not a release, not tracking updates");
            None
        }
    };
    Some((parse(deployed_tag)?, parse(required_tag)?))
}

/// State of the rollout of `target` on the deployed Deployment.
fn rollout(deployed: Option<&Deployment>, target: &str) -> Rollout {
    let Some(deployment) = deployed else {
        return Rollout::Progressing;
    };
    let conditions = deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    let progressing = conditions.iter().filter(|c| c.type_ == PROGRESSING);

    let mut complete = false;
    for condition in progressing {
        if condition.status == "False" {
            return Rollout::Failed;
        }
        if condition.reason.as_deref() == Some(NEW_REPLICA_SET_AVAILABLE) {
            complete = true;
        }
    }

    // A condition left over from the previous rollout doesn't count
    let observed = match (
        deployment.metadata.generation,
        deployment.status.as_ref().and_then(|s| s.observed_generation),
    ) {
        (Some(generation), Some(observed)) => observed >= generation,
        _ => true,
    };
    let on_target = nexus_image(deployment)
        .and_then(|image| split_image(image).1)
        .is_some_and(|tag| tag == target);

    if complete && observed && on_target {
        Rollout::Complete
    } else {
        Rollout::Progressing
    }
}

fn set_log(nexus: &mut Nexus, log: Vec<String>) {
    nexus.status.get_or_insert_with(Default::default).update_conditions = log;
}

fn push_log(nexus: &mut Nexus, entry: String) {
    nexus
        .status
        .get_or_insert_with(Default::default)
        .update_conditions
        .push(entry);
}

fn clear_log(nexus: &mut Nexus) {
    if let Some(status) = nexus.status.as_mut()
        && !status.update_conditions.is_empty()
    {
        debug!(name = %nexus.metadata.name.as_deref().unwrap_or_default(), "Clearing update log");
        status.update_conditions.clear();
    }
}
