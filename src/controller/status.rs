//! Status computation.
//!
//! Folds what a reconcile observed into `NexusStatus`: phase, replica
//! counts, external URL and the Ready / Progressing / Degraded conditions.

use k8s_openapi::api::apps::v1::Deployment;

use crate::controller::update_state::UpdateState;
use crate::crd::{Condition, DeploymentStatusSummary, Nexus, NexusPhase, NexusStatus};

/// Builder for managing conditions list
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Start from existing conditions, so unchanged ones keep their
    /// transition time.
    pub fn from_existing(conditions: &[Condition]) -> Self {
        Self {
            conditions: conditions.to_vec(),
        }
    }

    /// Add or update a condition
    pub fn set(&mut self, mut condition: Condition) -> &mut Self {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
        self
    }

    /// Set Ready condition
    pub fn ready(
        &mut self,
        ready: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::ready(ready, reason, message, generation))
    }

    /// Set Progressing condition
    pub fn progressing(
        &mut self,
        progressing: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::progressing(
            progressing,
            reason,
            message,
            generation,
        ))
    }

    /// Set Degraded condition
    pub fn degraded(
        &mut self,
        degraded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::degraded(degraded, reason, message, generation))
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a condition type is true
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .is_some_and(|c| c.status == "True")
}

/// What a successful reconcile saw.
#[derive(Debug, Default)]
pub struct Observation<'a> {
    /// The Deployment as last read from the cluster.
    pub deployment: Option<&'a Deployment>,
    /// External URL, when exposed and known.
    pub url: Option<String>,
    /// Whether the apply pass found nothing to change.
    pub converged: bool,
}

/// Replica counts of a Deployment.
pub fn deployment_summary(deployment: &Deployment) -> DeploymentStatusSummary {
    let status = deployment.status.as_ref();
    DeploymentStatusSummary {
        replicas: status.and_then(|s| s.replicas).unwrap_or(0),
        available_replicas: status.and_then(|s| s.available_replicas).unwrap_or(0),
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
    }
}

/// Whether the Deployment has at least one available replica.
pub fn is_available(deployment: Option<&Deployment>) -> bool {
    deployment.is_some_and(|d| deployment_summary(d).available_replicas > 0)
}

/// Record a successful reconcile in `nexus.status`.
pub fn observe(nexus: &mut Nexus, observation: Observation<'_>) {
    let generation = nexus.metadata.generation;
    let desired_replicas = nexus.spec.replicas;
    let updating = UpdateState::from_log(nexus.update_conditions())
        .is_ok_and(|state| state.is_updating());
    let available = is_available(observation.deployment);

    let (phase, reason) = if updating {
        (NexusPhase::Updating, "Automatic update in progress".to_string())
    } else if available {
        (NexusPhase::Ok, "Nexus is available".to_string())
    } else if desired_replicas == 0 {
        (NexusPhase::Ok, "Scaled to zero replicas".to_string())
    } else {
        (NexusPhase::Pending, "Waiting for Nexus to become available".to_string())
    };

    let status = nexus.status.get_or_insert_with(NexusStatus::default);
    let mut conditions = ConditionBuilder::from_existing(&status.conditions);
    conditions
        .ready(phase == NexusPhase::Ok, &reason_token(phase), &reason, generation)
        .progressing(
            updating || !observation.converged || phase == NexusPhase::Pending,
            if updating { "Updating" } else if observation.converged { "Converged" } else { "Applying" },
            &reason,
            generation,
        )
        .degraded(false, "Reconciled", "Last reconcile succeeded", generation);

    status.nexus_status = phase;
    status.reason = Some(reason);
    status.deployment_status = observation.deployment.map(deployment_summary);
    status.nexus_route = observation.url;
    status.conditions = conditions.build();
    status.observed_generation = generation;
}

/// Record a failed reconcile in `nexus.status`. Everything else observed
/// earlier is kept.
pub fn mark_failure(nexus: &mut Nexus, reason: &str) {
    let generation = nexus.metadata.generation;
    let status = nexus.status.get_or_insert_with(NexusStatus::default);
    let mut conditions = ConditionBuilder::from_existing(&status.conditions);
    conditions
        .ready(false, "Failure", reason, generation)
        .degraded(true, "ReconcileFailed", reason, generation);

    status.nexus_status = NexusPhase::Failure;
    status.reason = Some(reason.to_string());
    status.conditions = conditions.build();
    status.observed_generation = generation;
}

fn reason_token(phase: NexusPhase) -> String {
    match phase {
        NexusPhase::Ok => "Available".to_string(),
        other => other.to_string(),
    }
}
