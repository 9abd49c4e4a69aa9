//! Deployment generation for Nexus.
//!
//! Creates a single-replica Deployment running the Nexus server:
//! - JVM heap sized from the container memory limit
//! - HTTP probes against the status endpoint
//! - `/nexus-data` backed by a PVC or an emptyDir
//! - Recreate strategy (a RWO volume can't be shared during a rollout)

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, HTTPGetAction,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::{Nexus, ProbeSpec, ResourceListSpec};
use crate::resources::common::{
    DATA_VOLUME_NAME, NEXUS_PORT, child_metadata, pod_selector_labels, standard_labels,
};
use crate::resources::quantity::parse_quantity;

/// Name of the Nexus container.
pub const NEXUS_CONTAINER_NAME: &str = "nexus-server";
/// Mount path of the data volume.
const DATA_MOUNT_PATH: &str = "/nexus-data";
/// Endpoint answering 200 once the server is up.
const STATUS_PATH: &str = "/service/rest/v1/status";
/// JVM parameters environment variable understood by the Nexus image.
pub const JVM_PARAMS_ENV: &str = "INSTALL4J_ADD_VM_PARAMS";
/// Environment variable controlling the random admin password.
pub const RANDOM_PASSWORD_ENV: &str = "NEXUS_SECURITY_RANDOMPASSWORD";
/// Memory limit assumed when the spec value can't be parsed.
const FALLBACK_MEMORY_MIB: u64 = 2048;

/// Generate the Deployment for a Nexus.
pub fn generate_deployment(resource: &Nexus) -> Deployment {
    let name = resource.name_any();
    let labels = standard_labels(resource);

    Deployment {
        metadata: child_metadata(resource, name),
        spec: Some(DeploymentSpec {
            replicas: Some(resource.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(pod_selector_labels(resource)),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(resource.service_account_name()),
                    containers: vec![generate_container(resource)],
                    volumes: Some(vec![generate_data_volume(resource)]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn generate_container(resource: &Nexus) -> Container {
    let spec = &resource.spec;

    let mut env = vec![EnvVar {
        name: JVM_PARAMS_ENV.to_string(),
        value: Some(jvm_params(&spec.resources.limits)),
        ..Default::default()
    }];
    if !spec.generate_random_admin_password {
        env.push(EnvVar {
            name: RANDOM_PASSWORD_ENV.to_string(),
            value: Some("false".to_string()),
            ..Default::default()
        });
    }

    Container {
        name: NEXUS_CONTAINER_NAME.to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: spec.image_pull_policy.clone(),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: NEXUS_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(env),
        resources: Some(ResourceRequirements {
            requests: Some(quantities(&spec.resources.requests)),
            limits: Some(quantities(&spec.resources.limits)),
            ..Default::default()
        }),
        liveness_probe: Some(http_probe(
            &spec.liveness_probe.clone().unwrap_or_default(),
        )),
        readiness_probe: Some(http_probe(
            &spec.readiness_probe.clone().unwrap_or_default(),
        )),
        volume_mounts: Some(vec![VolumeMount {
            name: DATA_VOLUME_NAME.to_string(),
            mount_path: DATA_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn generate_data_volume(resource: &Nexus) -> Volume {
    if resource.spec.persistence.persistent {
        Volume {
            name: DATA_VOLUME_NAME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: resource.name_any(),
                ..Default::default()
            }),
            ..Default::default()
        }
    } else {
        Volume {
            name: DATA_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    }
}

fn http_probe(probe: &ProbeSpec) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(STATUS_PATH.to_string()),
            port: IntOrString::Int(NEXUS_PORT),
            scheme: Some("HTTP".to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(probe.initial_delay_seconds),
        period_seconds: Some(probe.period_seconds),
        timeout_seconds: Some(probe.timeout_seconds),
        success_threshold: Some(probe.success_threshold),
        failure_threshold: Some(probe.failure_threshold),
        ..Default::default()
    }
}

fn quantities(list: &ResourceListSpec) -> BTreeMap<String, Quantity> {
    let mut quantities = BTreeMap::new();
    if !list.cpu.is_empty() {
        quantities.insert("cpu".to_string(), Quantity(list.cpu.clone()));
    }
    if !list.memory.is_empty() {
        quantities.insert("memory".to_string(), Quantity(list.memory.clone()));
    }
    quantities
}

/// JVM parameters derived from the memory limit: 60% heap, 30% direct memory.
pub fn jvm_params(limits: &ResourceListSpec) -> String {
    let limit = parse_memory_mib(&limits.memory).unwrap_or(FALLBACK_MEMORY_MIB);
    let heap = limit * 6 / 10;
    let direct = limit * 3 / 10;
    format!(
        "-Xms{heap}m -Xmx{heap}m -XX:MaxDirectMemorySize={direct}m \
         -Djava.util.prefs.userRoot={DATA_MOUNT_PATH}/javaprefs"
    )
}

/// Parse a Kubernetes memory quantity into mebibytes, rounding down.
/// Returns `None` when it isn't a quantity.
pub fn parse_memory_mib(quantity: &str) -> Option<u64> {
    let bytes = parse_quantity(quantity)? / 1_000_000_000;
    u64::try_from(bytes >> 20).ok()
}

/// Image of the Nexus container of a Deployment.
pub fn nexus_image(deployment: &Deployment) -> Option<&str> {
    let containers = &deployment.spec.as_ref()?.template.spec.as_ref()?.containers;
    containers
        .iter()
        .find(|c| c.name == NEXUS_CONTAINER_NAME)
        .or_else(|| containers.first())
        .and_then(|c| c.image.as_deref())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::crd::NexusSpec;

    fn test_resource() -> Nexus {
        let mut nexus = Nexus::new(
            "nexus3",
            NexusSpec {
                image: "docker.io/sonatype/nexus3:3.28.1".to_string(),
                ..Default::default()
            },
        );
        nexus.metadata.namespace = Some("tools".to_string());
        nexus
    }

    #[test]
    fn test_generate_deployment_basics() {
        let deployment = generate_deployment(&test_resource());
        assert_eq!(deployment.metadata.name.as_deref(), Some("nexus3"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("tools"));
        assert!(deployment.metadata.owner_references.is_none());

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.strategy.unwrap().type_.as_deref(), Some("Recreate"));

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.service_account_name.as_deref(), Some("nexus3"));
        let container = &pod.containers[0];
        assert_eq!(
            container.image.as_deref(),
            Some("docker.io/sonatype/nexus3:3.28.1")
        );
        let probe = container.readiness_probe.as_ref().unwrap();
        assert_eq!(probe.initial_delay_seconds, Some(240));
    }

    #[test]
    fn test_emptydir_unless_persistent() {
        let mut resource = test_resource();
        let pod = generate_deployment(&resource).spec.unwrap().template.spec.unwrap();
        assert!(pod.volumes.unwrap()[0].empty_dir.is_some());

        resource.spec.persistence.persistent = true;
        let pod = generate_deployment(&resource).spec.unwrap().template.spec.unwrap();
        let volume = &pod.volumes.unwrap()[0];
        assert_eq!(
            volume.persistent_volume_claim.as_ref().unwrap().claim_name,
            "nexus3"
        );
    }

    #[test]
    fn test_random_password_env() {
        let mut resource = test_resource();
        let env = |r: &Nexus| {
            generate_deployment(r).spec.unwrap().template.spec.unwrap().containers[0]
                .env
                .clone()
                .unwrap()
        };
        assert!(env(&resource).iter().any(|e| e.name == RANDOM_PASSWORD_ENV));

        resource.spec.generate_random_admin_password = true;
        assert!(!env(&resource).iter().any(|e| e.name == RANDOM_PASSWORD_ENV));
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory_mib("2Gi"), Some(2048));
        assert_eq!(parse_memory_mib("512Mi"), Some(512));
        assert_eq!(parse_memory_mib("1G"), Some(953));
        assert_eq!(parse_memory_mib("1.5Gi"), Some(1536));
        assert_eq!(parse_memory_mib("lots"), None);
        assert_eq!(parse_memory_mib("2Xi"), None);
    }

    #[test]
    fn test_jvm_params_from_limit() {
        let params = jvm_params(&ResourceListSpec {
            cpu: "2".to_string(),
            memory: "2Gi".to_string(),
        });
        assert!(params.starts_with("-Xms1228m -Xmx1228m -XX:MaxDirectMemorySize=614m"));
    }
}
