//! Nexus Custom Resource Definition.
//!
//! Declares the desired state of a single Nexus Repository Manager 3 server:
//! image and automatic update policy, persistence, networking exposure and the
//! server operations the operator performs against the Nexus REST API.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Community Nexus image.
pub const NEXUS_COMMUNITY_IMAGE: &str = "docker.io/sonatype/nexus3";

/// Red Hat certified Nexus image.
pub const NEXUS_CERTIFIED_IMAGE: &str =
    "registry.connect.redhat.com/sonatype/nexus-repository-manager";

/// Nexus is a custom resource for deploying a Nexus Repository Manager 3 server.
///
/// Example:
/// ```yaml
/// apiVersion: apps.m88i.io/v1alpha1
/// kind: Nexus
/// metadata:
///   name: nexus3
/// spec:
///   replicas: 1
///   automaticUpdate:
///     minorVersion: 28
///   persistence:
///     persistent: true
///     volumeSize: 10Gi
///   networking:
///     expose: true
///     exposeAs: Ingress
///     host: nexus.example.com
/// ```
#[derive(CustomResource, Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "apps.m88i.io",
    version = "v1alpha1",
    kind = "Nexus",
    plural = "nexus",
    shortname = "nx",
    status = "NexusStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.nexusStatus"}"#,
    printcolumn = r#"{"name":"Image", "type":"string", "jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Route", "type":"string", "jsonPath":".status.nexusRoute"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NexusSpec {
    /// Number of pods. Nexus OSS cannot be clustered, so only 0 and 1 are accepted.
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Full container image reference. The tag is optional and managed by the
    /// operator while automatic updates are enabled.
    #[serde(default)]
    pub image: String,

    /// Image pull policy for the Nexus container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Use the Red Hat certified image instead of the community one.
    #[serde(default)]
    pub use_red_hat_image: bool,

    /// Automatic update policy.
    #[serde(default)]
    pub automatic_update: AutomaticUpdateSpec,

    /// Resource requests and limits for the Nexus container.
    #[serde(default)]
    pub resources: ResourceRequirementsSpec,

    /// Persistence configuration for `/nexus-data`.
    #[serde(default)]
    pub persistence: PersistenceSpec,

    /// How the server is reached from outside the cluster.
    #[serde(default)]
    pub networking: NetworkingSpec,

    /// Service account for the Nexus pod (defaults to the resource name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Keep the random admin password generated by Nexus on first boot.
    /// The operator can't create its own user when this is set.
    #[serde(default)]
    pub generate_random_admin_password: bool,

    /// Liveness probe tuning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeSpec>,

    /// Readiness probe tuning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeSpec>,

    /// Operations performed against the running server.
    #[serde(default)]
    pub server_operations: ServerOperationsSpec,

    /// Additional labels to apply to all managed resources.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Default for NexusSpec {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            image: String::new(),
            image_pull_policy: None,
            use_red_hat_image: false,
            automatic_update: AutomaticUpdateSpec::default(),
            resources: ResourceRequirementsSpec::default(),
            persistence: PersistenceSpec::default(),
            networking: NetworkingSpec::default(),
            service_account_name: None,
            generate_random_admin_password: false,
            liveness_probe: None,
            readiness_probe: None,
            server_operations: ServerOperationsSpec::default(),
            labels: BTreeMap::new(),
        }
    }
}

fn default_replicas() -> i32 {
    1
}

/// Automatic update policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticUpdateSpec {
    /// Disable automatic updates entirely.
    #[serde(default)]
    pub disabled: bool,

    /// Minor version to follow (e.g. 28 for 3.28.x). Defaults to the latest
    /// published minor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_version: Option<u32>,
}

/// Resource requirements for the Nexus container.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirementsSpec {
    /// CPU and memory requests.
    #[serde(default = "default_requests")]
    pub requests: ResourceListSpec,

    /// CPU and memory limits.
    #[serde(default = "default_limits")]
    pub limits: ResourceListSpec,
}

impl Default for ResourceRequirementsSpec {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            limits: default_limits(),
        }
    }
}

fn default_requests() -> ResourceListSpec {
    ResourceListSpec {
        cpu: "1".to_string(),
        memory: "2Gi".to_string(),
    }
}

fn default_limits() -> ResourceListSpec {
    ResourceListSpec {
        cpu: "2".to_string(),
        memory: "2Gi".to_string(),
    }
}

/// CPU and memory quantities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ResourceListSpec {
    /// CPU quantity (e.g. "1", "500m").
    pub cpu: String,
    /// Memory quantity (e.g. "2Gi").
    pub memory: String,
}

/// Persistence configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSpec {
    /// Back `/nexus-data` with a PersistentVolumeClaim instead of an emptyDir.
    #[serde(default)]
    pub persistent: bool,

    /// Size of the claim (default: 10Gi).
    #[serde(default = "default_volume_size")]
    pub volume_size: String,

    /// Storage class for the claim. The cluster default is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl Default for PersistenceSpec {
    fn default() -> Self {
        Self {
            persistent: false,
            volume_size: default_volume_size(),
            storage_class: None,
        }
    }
}

fn default_volume_size() -> String {
    "10Gi".to_string()
}

/// Networking configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkingSpec {
    /// Expose the server outside the cluster.
    #[serde(default)]
    pub expose: bool,

    /// Exposure mechanism. Defaults to Route on OpenShift and Ingress elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_as: Option<ExposeType>,

    /// Host name for Ingress or Route exposure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Node port for NodePort exposure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,

    /// TLS settings.
    #[serde(default)]
    pub tls: NexusTlsSpec,
}

/// Exposure mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ExposeType {
    /// OpenShift Route.
    Route,
    /// Kubernetes Ingress.
    Ingress,
    /// NodePort Service.
    NodePort,
}

impl std::fmt::Display for ExposeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExposeType::Route => write!(f, "Route"),
            ExposeType::Ingress => write!(f, "Ingress"),
            ExposeType::NodePort => write!(f, "NodePort"),
        }
    }
}

/// TLS settings for exposure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NexusTlsSpec {
    /// Only accept TLS traffic (Route redirects insecure requests).
    #[serde(default)]
    pub mandatory: bool,

    /// Secret holding the certificate for Ingress TLS termination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Probe tuning.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    /// Seconds before the first probe.
    #[serde(default = "default_probe_initial_delay")]
    pub initial_delay_seconds: i32,
    /// Seconds between probes.
    #[serde(default = "default_probe_period")]
    pub period_seconds: i32,
    /// Seconds before a probe times out.
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: i32,
    /// Consecutive successes to be considered healthy.
    #[serde(default = "default_probe_success_threshold")]
    pub success_threshold: i32,
    /// Consecutive failures to be considered unhealthy.
    #[serde(default = "default_probe_failure_threshold")]
    pub failure_threshold: i32,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            initial_delay_seconds: default_probe_initial_delay(),
            period_seconds: default_probe_period(),
            timeout_seconds: default_probe_timeout(),
            success_threshold: default_probe_success_threshold(),
            failure_threshold: default_probe_failure_threshold(),
        }
    }
}

fn default_probe_initial_delay() -> i32 {
    240
}

fn default_probe_period() -> i32 {
    10
}

fn default_probe_timeout() -> i32 {
    15
}

fn default_probe_success_threshold() -> i32 {
    1
}

fn default_probe_failure_threshold() -> i32 {
    3
}

/// Server operations switches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerOperationsSpec {
    /// Don't create the operator user. Also disables every other operation.
    #[serde(default)]
    pub disable_operator_user_creation: bool,

    /// Don't create the community proxy repositories.
    #[serde(default)]
    pub disable_repository_creation: bool,
}

// ============================================================================
// Status
// ============================================================================

/// Status of a Nexus resource.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NexusStatus {
    /// Overall state.
    #[serde(default)]
    pub nexus_status: NexusPhase,

    /// Human-readable reason for the current state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Replica counts copied from the managed Deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_status: Option<DeploymentStatusSummary>,

    /// External URL of the server, when exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nexus_route: Option<String>,

    /// Results of the REST operations performed on the server.
    #[serde(default)]
    pub server_operations_status: ServerOperationsStatus,

    /// Automatic update log. Either empty, or its last entry describes the
    /// update currently tracked (or the outcome of the last one).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_conditions: Vec<String>,

    /// Conditions describing the current state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// The generation most recently observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Replica counts of the managed Deployment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusSummary {
    /// Total replicas.
    #[serde(default)]
    pub replicas: i32,
    /// Available replicas.
    #[serde(default)]
    pub available_replicas: i32,
    /// Ready replicas.
    #[serde(default)]
    pub ready_replicas: i32,
}

/// Results of the server operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerOperationsStatus {
    /// The operator user exists on the server.
    #[serde(default)]
    pub operator_user_created: bool,

    /// The community proxy repositories exist.
    #[serde(default)]
    pub community_repositories_created: bool,

    /// maven-public contains the community repositories.
    #[serde(default)]
    pub maven_central_updated: bool,

    /// URL of the maven-public group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_public_url: Option<String>,

    /// Last failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Overall state of a Nexus resource.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum NexusPhase {
    /// Resources are being created or the server is starting.
    #[default]
    Pending,
    /// The server is available.
    #[serde(rename = "OK")]
    Ok,
    /// Reconciliation failed.
    Failure,
    /// An automatic update is rolling out.
    Updating,
}

impl NexusPhase {
    pub const ALL: [NexusPhase; 4] = [
        NexusPhase::Pending,
        NexusPhase::Ok,
        NexusPhase::Failure,
        NexusPhase::Updating,
    ];
}

impl std::fmt::Display for NexusPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NexusPhase::Pending => write!(f, "Pending"),
            NexusPhase::Ok => write!(f, "OK"),
            NexusPhase::Failure => write!(f, "Failure"),
            NexusPhase::Updating => write!(f, "Updating"),
        }
    }
}

/// Condition represents an observation of the resource's state.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        condition_type: &str,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }

    /// Create a "Ready" condition.
    pub fn ready(ready: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Ready", ready, reason, message, generation)
    }

    /// Create a "Progressing" condition.
    pub fn progressing(
        progressing: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self::new("Progressing", progressing, reason, message, generation)
    }

    /// Create a "Degraded" condition.
    pub fn degraded(degraded: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Degraded", degraded, reason, message, generation)
    }

    /// Whether type, status, reason and message match, ignoring the timestamp.
    pub fn same_state(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

impl Nexus {
    /// Service account used by the Nexus pod.
    pub fn service_account_name(&self) -> String {
        self.spec
            .service_account_name
            .clone()
            .unwrap_or_else(|| kube::ResourceExt::name_any(self))
    }

    /// Current automatic update log.
    pub fn update_conditions(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|s| s.update_conditions.as_slice())
            .unwrap_or_default()
    }
}
