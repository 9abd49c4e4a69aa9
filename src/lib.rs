//! nexus-operator library crate
//!
//! Exports the Nexus CRD, the reconcile engine and its collaborators, and the
//! controller entry point.

pub mod capabilities;
pub mod config;
pub mod controller;
pub mod crd;
pub mod events;
pub mod health;
pub mod managers;
pub mod resources;
pub mod server;
pub mod store;
pub mod tags;
pub mod version;

pub use config::OperatorConfig;
pub use health::HealthState;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, metadata_watcher, predicates, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use controller::context::Context;
use controller::error::Result;
use controller::reconciler::{error_policy, reconcile};
use crd::Nexus;

/// Name the operator reports as event source and field manager.
pub const OPERATOR_NAME: &str = "nexus-operator";

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Watcher configuration shared by every stream of the controller.
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a filtered stream for a resource type with standard optimizations.
///
/// This creates a reflector-backed stream that:
/// - Maintains an in-memory cache via reflector
/// - Uses automatic retry with exponential backoff on errors
/// - Converts watch events to objects (Added/Modified only)
/// - Filters out status-only updates via generation predicate
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = std::result::Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// Run the Nexus controller until its stream ends.
///
/// Watches Nexus resources in `config.watch_namespace` (all namespaces when
/// unset) together with their children. If `health_state` is provided,
/// reconciles are recorded in its metrics.
pub async fn run_controller(
    client: Client,
    config: &OperatorConfig,
    health_state: Option<Arc<HealthState>>,
) -> Result<()> {
    let namespace = config.watch_namespace.as_deref();
    info!(
        scope = namespace.unwrap_or("cluster-wide"),
        "Starting controller for Nexus resources"
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::new(client.clone(), config, health_state)?);

    let nexuses: Api<Nexus> = scoped_api(client.clone(), namespace);
    let deployments: Api<Deployment> = scoped_api(client.clone(), namespace);
    let services: Api<Service> = scoped_api(client.clone(), namespace);
    let claims: Api<PersistentVolumeClaim> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);
    let accounts: Api<ServiceAccount> = scoped_api(client.clone(), namespace);
    let ingresses: Api<Ingress> = scoped_api(client, namespace);

    let watcher_config = default_watcher_config();
    let (reader, nexus_stream) = create_filtered_stream(nexuses, watcher_config.clone());

    // Deployment status drives update tracking, so it gets a full watcher;
    // for the other children knowing that they changed is enough
    Controller::for_stream(nexus_stream, reader)
        .owns(deployments, watcher_config.clone())
        .owns_stream(metadata_watcher(services, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(claims, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(secrets, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(accounts, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(ingresses, watcher_config).touched_objects())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Watch events of children can arrive after their Nexus is gone
                    let is_not_found = match &e {
                        kube::runtime::controller::Error::ObjectNotFound(_) => true,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                            err.is_not_found()
                        }
                        _ => false,
                    };
                    if is_not_found {
                        debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    error!("Controller stream ended unexpectedly");
    Ok(())
}
