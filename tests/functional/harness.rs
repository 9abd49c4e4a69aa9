//! Reconcile harness over in-memory collaborators.
//!
//! `Harness` owns a `MemoryStore`, a `RecordingEventPublisher` and a
//! `FakeServer`, and runs the production `reconcile` against them. Cluster
//! side effects the operator doesn't cause itself (a rollout finishing, a
//! user editing the CR) are simulated by editing the store directly.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use kube::runtime::controller::Action;
use nexus_operator::capabilities::StaticCapabilities;
use nexus_operator::controller::context::Context;
use nexus_operator::controller::error::Result;
use nexus_operator::controller::persist::RetryPolicy;
use nexus_operator::controller::reconciler::reconcile;
use nexus_operator::crd::{Nexus, NexusPhase};
use nexus_operator::resources::{ManagedKind, ManagedResource, ResourceKey};
use nexus_operator::server::{Credentials, MavenProxyRepository, ServerError, ServerOperator};
use nexus_operator::tags::{StaticTags, TagCache, TagSource};

use crate::mock_events::RecordingEventPublisher;
use crate::mock_store::MemoryStore;

/// Nexus REST server double recording every call.
#[derive(Default)]
pub struct FakeServer {
    calls: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ServerOperator for FakeServer {
    async fn ensure_operator_user(
        &self,
        _base_url: &str,
        _admin: &Credentials,
        user: &Credentials,
    ) -> std::result::Result<(), ServerError> {
        self.record(format!("user {}", user.username));
        Ok(())
    }

    async fn ensure_proxy_repositories(
        &self,
        _base_url: &str,
        _credentials: &Credentials,
        repositories: &[MavenProxyRepository],
    ) -> std::result::Result<(), ServerError> {
        let names: Vec<&str> = repositories.iter().map(|r| r.name.as_str()).collect();
        self.record(format!("repositories {}", names.join(",")));
        Ok(())
    }

    async fn ensure_group_members(
        &self,
        _base_url: &str,
        _credentials: &Credentials,
        group: &str,
        members: &[&str],
    ) -> std::result::Result<(), ServerError> {
        self.record(format!("group {group} {}", members.join(",")));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEventPublisher>,
    pub server: Arc<FakeServer>,
    pub ctx: Arc<Context>,
}

impl Harness {
    /// A plain Kubernetes cluster with no published tags.
    pub fn kubernetes() -> Self {
        Self::new(StaticCapabilities::kubernetes(), &[])
    }

    /// A plain Kubernetes cluster where `tags` are published.
    pub fn with_tags(tags: &[&str]) -> Self {
        Self::new(StaticCapabilities::kubernetes(), tags)
    }

    pub fn new(capabilities: StaticCapabilities, tags: &[&str]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let server = Arc::new(FakeServer::default());
        let ctx = Arc::new(Context {
            store: store.clone(),
            events: events.clone(),
            capabilities: Arc::new(capabilities),
            tags: Arc::new(TagCache::new(StaticTags::new(tags.iter().copied()))),
            server: server.clone(),
            retry: RetryPolicy::default(),
            health_state: None,
        });
        Self {
            store,
            events,
            server,
            ctx,
        }
    }

    /// Publish a new tag list. The cache is rebuilt, as if it had expired.
    pub fn publish_tags(&mut self, tags: &[&str]) {
        self.replace_tags(StaticTags::new(tags.iter().copied()));
    }

    /// Make the tag registry unreachable.
    pub fn registry_down(&mut self) {
        self.replace_tags(StaticTags::failing("registry unreachable"));
    }

    fn replace_tags(&mut self, tags: StaticTags) {
        let source: Arc<dyn TagSource> = Arc::new(TagCache::new(tags));
        let mut ctx = (*self.ctx).clone();
        ctx.tags = source;
        self.ctx = Arc::new(ctx);
    }

    /// Store `nexus` as if a user had applied it.
    pub fn apply(&self, nexus: Nexus) -> Nexus {
        self.store.insert_nexus(nexus)
    }

    /// Reconcile the stored Nexus `namespace/name` once.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action> {
        let obj = self
            .store
            .nexus(namespace, name)
            .unwrap_or_else(|| panic!("nexus {namespace}/{name} not stored"));
        reconcile(Arc::new(obj), self.ctx.clone()).await
    }

    pub fn nexus(&self, namespace: &str, name: &str) -> Nexus {
        self.store.nexus(namespace, name).unwrap()
    }

    pub fn phase(&self, namespace: &str, name: &str) -> NexusPhase {
        self.nexus(namespace, name).status.unwrap().nexus_status
    }

    pub fn update_log(&self, namespace: &str, name: &str) -> Vec<String> {
        self.nexus(namespace, name).update_conditions().to_vec()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Deployment {
        match self
            .store
            .resource(&ResourceKey::new(ManagedKind::Deployment, namespace, name))
        {
            Some(ManagedResource::Deployment(deployment)) => deployment,
            other => panic!("expected a Deployment, got {other:?}"),
        }
    }

    pub fn deployment_image(&self, namespace: &str, name: &str) -> String {
        self.deployment(namespace, name).spec.unwrap().template.spec.unwrap().containers[0]
            .image
            .clone()
            .unwrap()
    }

    /// Kinds and verbs of the child writes so far, e.g. `create Service`.
    pub fn writes(&self) -> Vec<String> {
        self.store
            .operations()
            .iter()
            .map(|op| op.split('/').next().unwrap_or_default().to_string())
            .collect()
    }

    /// Report the current rollout of the Deployment as finished and available.
    pub fn finish_rollout(&self, namespace: &str, name: &str) {
        self.set_rollout(namespace, name, "True", "NewReplicaSetAvailable", 1);
    }

    /// Report the current rollout of the Deployment as stuck.
    pub fn fail_rollout(&self, namespace: &str, name: &str) {
        self.set_rollout(namespace, name, "False", "ProgressDeadlineExceeded", 0);
    }

    fn set_rollout(&self, namespace: &str, name: &str, status: &str, reason: &str, available: i32) {
        let key = ResourceKey::new(ManagedKind::Deployment, namespace, name);
        let changed = self.store.modify(&key, |resource| {
            if let ManagedResource::Deployment(deployment) = resource {
                deployment.status = Some(DeploymentStatus {
                    replicas: Some(1),
                    available_replicas: Some(available),
                    ready_replicas: Some(available),
                    conditions: Some(vec![DeploymentCondition {
                        type_: "Progressing".to_string(),
                        status: status.to_string(),
                        reason: Some(reason.to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                });
            }
        });
        assert!(changed, "Deployment {namespace}/{name} not stored");
    }
}
