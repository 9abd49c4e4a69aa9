//! Reconciliation loop for Nexus.
//!
//! One pass brings the cluster toward a single Nexus CR:
//!
//! 1. fetch the CR and normalize it (defaults, automatic update target,
//!    validation), persisting the spec when normalization changed it
//! 2. build the managers and diff the required resources against the
//!    deployed ones
//! 3. apply the deltas, with the CR as controller owner
//! 4. track automatic updates of the Deployment image
//! 5. run the pending server operations once Nexus is available
//! 6. write the observed status back
//!
//! Children are garbage collected through their owner references, so
//! deletion needs no finalizer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, error, info, warn};

use crate::controller::apply::apply;
use crate::controller::context::Context;
use crate::controller::defaults::normalize;
use crate::controller::diff::{compare, is_converged};
use crate::controller::error::{Error, Result};
use crate::controller::persist::{persist_spec, persist_status};
use crate::controller::status::{self, Observation, deployment_summary, is_available};
use crate::controller::supervisor::{ResourceMap, Supervisor};
use crate::controller::update_monitor::UpdateMonitor;
use crate::crd::{ExposeType, Nexus, NexusPhase};
use crate::events::{actions, reasons};
use crate::resources::ingress::ingress_url;
use crate::resources::{ManagedKind, ManagedResource, owner_reference};
use crate::server::run_server_operations;

/// Requeue while something is still rolling out.
const PROGRESS_REQUEUE: Duration = Duration::from_secs(30);

/// Requeue once converged, to catch drift the watches miss.
const STEADY_REQUEUE: Duration = Duration::from_secs(300);

/// Reconcile a Nexus
///
/// Called by the controller for every change of the CR or one of its
/// children.
pub async fn reconcile(obj: Arc<Nexus>, ctx: Arc<Context>) -> Result<Action> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    debug!(name = %name, namespace = %namespace, "Reconciling Nexus");

    if obj.metadata.deletion_timestamp.is_some() {
        debug!(name = %name, "Nexus is being deleted, children follow through owner references");
        return Ok(Action::await_change());
    }

    // The copy in the watch cache may be stale; work on the stored object
    let mut nexus = match ctx.store.get_nexus(&namespace, &name).await {
        Ok(nexus) => nexus,
        Err(e) => {
            let e = Error::from(e);
            if e.is_not_found() {
                debug!(name = %name, "Nexus no longer exists");
                return Ok(Action::await_change());
            }
            return Err(e);
        }
    };

    match reconcile_nexus(&mut nexus, &ctx).await {
        Ok(action) => {
            if let Some(ref health_state) = ctx.health_state {
                let duration = start_time.elapsed().as_secs_f64();
                health_state
                    .metrics
                    .record_reconcile(&namespace, &name, duration);
                health_state.touch();
            }
            Ok(action)
        }
        Err(e) => {
            report_failure(&mut nexus, &ctx, &e).await;
            Err(e)
        }
    }
}

async fn reconcile_nexus(nexus: &mut Nexus, ctx: &Context) -> Result<Action> {
    let name = nexus.name_any();

    let normalized = match normalize(nexus, ctx.capabilities.as_ref(), ctx.tags.as_ref()).await {
        Ok(normalized) => normalized,
        Err(Error::Validation(message)) => return reject(nexus, ctx, &message).await,
        Err(e) => return Err(e),
    };
    if normalized.changed {
        info!(name = %name, "Persisting normalized spec");
        *nexus = match persist_spec(ctx.store.as_ref(), &normalized.nexus, ctx.retry).await {
            Ok(stored) => stored,
            Err(e @ Error::PersistTimeout { .. }) => {
                warn!(name = %name, error = %e, "Normalized spec not persisted, continuing");
                normalized.nexus
            }
            Err(e) => return Err(e),
        };
    } else {
        *nexus = normalized.nexus;
    }

    let mut supervisor = Supervisor::new();
    supervisor
        .init_managers(nexus, ctx.capabilities.as_ref())
        .await?;
    let required = supervisor.required_resources()?;
    let deployed = supervisor.deployed_resources(ctx.store.as_ref()).await?;
    let comparator = supervisor.comparator()?;

    let deltas = compare(&deployed, &required, &comparator);
    let converged = is_converged(&deltas);
    if !converged {
        let report = apply(ctx.store.as_ref(), &owner_reference(nexus), &deltas).await?;
        info!(
            name = %name,
            created = report.created.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            "Applied changes"
        );
    }

    let deployed_deployment = find_deployment(&deployed);
    if let Some(required_deployment) = find_deployment(&required) {
        let monitor = UpdateMonitor::new(ctx.store.as_ref(), ctx.events.as_ref(), ctx.retry);
        let outcome = monitor
            .monitor(nexus, deployed_deployment, required_deployment)
            .await?;
        if let (Some(label), Some(health_state)) = (outcome.label(), &ctx.health_state) {
            health_state.metrics.record_update(label);
        }
    }

    if is_available(deployed_deployment) {
        run_server_steps(nexus, ctx, find_secret(&deployed)).await;
    }

    let url = external_url(nexus, &deployed);
    status::observe(
        nexus,
        Observation {
            deployment: deployed_deployment,
            url,
            converged,
        },
    );
    write_status(nexus, ctx).await?;

    let phase = nexus
        .status
        .as_ref()
        .map(|s| s.nexus_status)
        .unwrap_or_default();
    if let Some(ref health_state) = ctx.health_state {
        let namespace = nexus.namespace().unwrap_or_default();
        let ready = deployed_deployment
            .map(|d| deployment_summary(d).ready_replicas)
            .unwrap_or(0);
        health_state.metrics.set_phase(&namespace, &name, phase);
        health_state.metrics.set_replicas(
            &namespace,
            &name,
            i64::from(nexus.spec.replicas),
            i64::from(ready),
        );
    }

    if converged && phase == NexusPhase::Ok {
        Ok(Action::requeue(STEADY_REQUEUE))
    } else {
        Ok(Action::requeue(PROGRESS_REQUEUE))
    }
}

/// Run the pending server operations and fold their result into status.
async fn run_server_steps(nexus: &mut Nexus, ctx: &Context, secret: Option<&Secret>) {
    let previous_reason = nexus
        .status
        .as_ref()
        .and_then(|s| s.server_operations_status.reason.clone());
    let result = run_server_operations(ctx.server.as_ref(), nexus, secret).await;

    if let Some(reason) = result.reason.as_ref().filter(|r| Some(*r) != previous_reason.as_ref()) {
        ctx.events
            .publish(
                &nexus.object_ref(&()),
                EventType::Warning,
                reasons::SERVER_OPERATIONS_FAILED,
                actions::SERVER_OPERATIONS,
                Some(reason.clone()),
            )
            .await;
    }
    nexus.status.get_or_insert_with(Default::default).server_operations_status = result;
}

/// Mark an invalid CR as failed without requeueing it in a tight loop.
async fn reject(nexus: &mut Nexus, ctx: &Context, message: &str) -> Result<Action> {
    warn!(name = %nexus.name_any(), reason = %message, "Nexus spec is invalid");
    status::mark_failure(nexus, message);
    write_status(nexus, ctx).await?;
    ctx.events
        .publish(
            &nexus.object_ref(&()),
            EventType::Warning,
            reasons::VALIDATION_FAILED,
            actions::VALIDATE,
            Some(message.to_string()),
        )
        .await;
    Ok(Action::requeue(STEADY_REQUEUE))
}

/// Record a fatal error on the CR, as far as the cluster lets us.
async fn report_failure(nexus: &mut Nexus, ctx: &Context, error: &Error) {
    let name = nexus.name_any();
    error!(name = %name, error = %error, "Reconcile failed");

    status::mark_failure(nexus, &error.to_string());
    if let Err(e) = persist_status(ctx.store.as_ref(), nexus, ctx.retry).await {
        warn!(name = %name, error = %e, "Failed to record failure in status");
    }
    ctx.events
        .publish(
            &nexus.object_ref(&()),
            EventType::Warning,
            reasons::RECONCILE_FAILED,
            actions::RECONCILE,
            Some(error.to_string()),
        )
        .await;
}

/// Persist `nexus.status`. Running out of conflict retries is not fatal;
/// the next reconcile writes again.
async fn write_status(nexus: &mut Nexus, ctx: &Context) -> Result<()> {
    match persist_status(ctx.store.as_ref(), nexus, ctx.retry).await {
        Ok(stored) => {
            *nexus = stored;
            Ok(())
        }
        Err(e @ Error::PersistTimeout { .. }) => {
            warn!(name = %nexus.name_any(), error = %e, "Status not persisted, next reconcile retries");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn find_deployment(resources: &ResourceMap) -> Option<&Deployment> {
    resources
        .get(&ManagedKind::Deployment)?
        .iter()
        .find_map(|resource| match resource {
            ManagedResource::Deployment(deployment) => Some(deployment),
            _ => None,
        })
}

fn find_secret(resources: &ResourceMap) -> Option<&Secret> {
    resources
        .get(&ManagedKind::Secret)?
        .iter()
        .find_map(|resource| match resource {
            ManagedResource::Secret(secret) => Some(secret),
            _ => None,
        })
}

/// External URL of the server, when exposed and known.
fn external_url(nexus: &Nexus, deployed: &ResourceMap) -> Option<String> {
    let networking = &nexus.spec.networking;
    if !networking.expose {
        return None;
    }
    match networking.expose_as? {
        ExposeType::Ingress => ingress_url(nexus),
        ExposeType::Route => deployed
            .get(&ManagedKind::Route)?
            .iter()
            .find_map(|resource| match resource {
                ManagedResource::Route(route) => route.url(),
                _ => None,
            }),
        ExposeType::NodePort => None,
    }
}

/// Error policy for the controller
///
/// Determines how to handle reconciliation errors.
pub fn error_policy(obj: Arc<Nexus>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}
