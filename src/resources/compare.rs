//! Equality functions deciding whether a deployed resource needs an update.
//!
//! Every function is called as `eq(deployed, required)` and only looks at
//! fields the required side sets. Anything the API server or another
//! controller fills in (cluster IPs, rollout knobs, default probe schemes,
//! token secrets) is ignored, otherwise every reconcile would issue an update.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaim, Probe, ResourceRequirements, Service, ServicePort, Volume,
};
use serde_json::Value;

use super::ManagedResource;
use super::quantity::{quantities_match, quantity_matches};

/// `eq(deployed, required)`.
pub type EqualityFn = fn(&ManagedResource, &ManagedResource) -> bool;

/// Structural equality restricted to the fields present on the required side.
///
/// Compares labels and the kind's payload (spec, or data for Secrets).
pub fn default_equality(deployed: &ManagedResource, required: &ManagedResource) -> bool {
    if deployed.kind() != required.kind() {
        return false;
    }
    json_subset(&projection(required), &projection(deployed))
}

/// Whether every non-null field of `required` is present and equal in
/// `deployed`. Arrays must match element for element.
pub fn json_subset(required: &Value, deployed: &Value) -> bool {
    match (required, deployed) {
        (Value::Null, _) => true,
        (Value::Object(req), Value::Object(dep)) => req.iter().all(|(key, value)| {
            value.is_null() || dep.get(key).is_some_and(|d| json_subset(value, d))
        }),
        (Value::Array(req), Value::Array(dep)) => {
            req.len() == dep.len() && req.iter().zip(dep).all(|(r, d)| json_subset(r, d))
        }
        (req, dep) => req == dep,
    }
}

fn projection(resource: &ManagedResource) -> Value {
    let payload = match resource {
        ManagedResource::ServiceAccount(r) => serde_json::json!({
            "automountServiceAccountToken": r.automount_service_account_token,
            "imagePullSecrets": r.image_pull_secrets,
        }),
        ManagedResource::Secret(r) => serde_json::json!({ "type": r.type_, "data": r.data }),
        ManagedResource::PersistentVolumeClaim(r) => to_value(&r.spec),
        ManagedResource::Deployment(r) => to_value(&r.spec),
        ManagedResource::Service(r) => to_value(&r.spec),
        ManagedResource::Ingress(r) => to_value(&r.spec),
        ManagedResource::Route(r) => to_value(&r.spec),
    };
    serde_json::json!({
        "labels": resource.metadata().labels,
        "payload": payload,
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Required labels must all be present on the deployed object.
fn labels_match(deployed: &ManagedResource, required: &ManagedResource) -> bool {
    let empty = BTreeMap::new();
    let deployed = deployed.metadata().labels.as_ref().unwrap_or(&empty);
    required
        .metadata()
        .labels
        .as_ref()
        .unwrap_or(&empty)
        .iter()
        .all(|(k, v)| deployed.get(k) == Some(v))
}

/// `None` on the required side means "don't care".
fn opt_matches<T: PartialEq>(deployed: &Option<T>, required: &Option<T>) -> bool {
    required.is_none() || deployed == required
}

/// Deployment equality: replicas, selector, pod labels, service account,
/// containers and volumes. The rollout strategy is ignored.
pub fn deployment_equality(deployed: &ManagedResource, required: &ManagedResource) -> bool {
    let (ManagedResource::Deployment(deployed_dep), ManagedResource::Deployment(required_dep)) =
        (deployed, required)
    else {
        return false;
    };
    labels_match(deployed, required) && deployment_spec_matches(deployed_dep, required_dep)
}

fn deployment_spec_matches(deployed: &Deployment, required: &Deployment) -> bool {
    let (Some(dep), Some(req)) = (&deployed.spec, &required.spec) else {
        return deployed.spec.is_none() && required.spec.is_none();
    };
    if dep.replicas.unwrap_or(1) != req.replicas.unwrap_or(1) {
        return false;
    }
    if dep.selector.match_labels != req.selector.match_labels {
        return false;
    }

    let dep_labels = dep.template.metadata.as_ref().and_then(|m| m.labels.as_ref());
    let req_labels = req.template.metadata.as_ref().and_then(|m| m.labels.as_ref());
    if dep_labels != req_labels {
        return false;
    }

    let (Some(dep_pod), Some(req_pod)) = (&dep.template.spec, &req.template.spec) else {
        return dep.template.spec.is_none() && req.template.spec.is_none();
    };
    if !opt_matches(&dep_pod.service_account_name, &req_pod.service_account_name) {
        return false;
    }
    if dep_pod.containers.len() != req_pod.containers.len()
        || !dep_pod
            .containers
            .iter()
            .zip(&req_pod.containers)
            .all(|(d, r)| container_matches(d, r))
    {
        return false;
    }

    let no_volumes = Vec::new();
    let dep_volumes = dep_pod.volumes.as_ref().unwrap_or(&no_volumes);
    let req_volumes = req_pod.volumes.as_ref().unwrap_or(&no_volumes);
    dep_volumes.len() == req_volumes.len()
        && dep_volumes
            .iter()
            .zip(req_volumes)
            .all(|(d, r)| volume_matches(d, r))
}

fn container_matches(deployed: &Container, required: &Container) -> bool {
    deployed.name == required.name
        && deployed.image == required.image
        && opt_matches(&deployed.image_pull_policy, &required.image_pull_policy)
        && deployed.env.clone().unwrap_or_default() == required.env.clone().unwrap_or_default()
        && resources_match(&deployed.resources, &required.resources)
        && probe_matches(&deployed.liveness_probe, &required.liveness_probe)
        && probe_matches(&deployed.readiness_probe, &required.readiness_probe)
        && container_ports_match(deployed, required)
        && volume_mounts_match(deployed, required)
}

/// Limits and requests compared by amount. A request left out defaults to
/// the limit, as the API server fills it in.
fn resources_match(
    deployed: &Option<ResourceRequirements>,
    required: &Option<ResourceRequirements>,
) -> bool {
    let lists = |resources: &Option<ResourceRequirements>| {
        let resources = resources.clone().unwrap_or_default();
        let limits = resources.limits.unwrap_or_default();
        let mut requests = resources.requests.unwrap_or_default();
        for (name, limit) in &limits {
            requests.entry(name.clone()).or_insert_with(|| limit.clone());
        }
        (limits, requests)
    };
    let (deployed_limits, deployed_requests) = lists(deployed);
    let (required_limits, required_requests) = lists(required);
    quantities_match(&deployed_limits, &required_limits)
        && quantities_match(&deployed_requests, &required_requests)
}

fn container_ports_match(deployed: &Container, required: &Container) -> bool {
    let ports = |c: &Container| {
        c.ports
            .iter()
            .flatten()
            .map(|p| (p.name.clone(), p.container_port))
            .collect::<Vec<_>>()
    };
    ports(deployed) == ports(required)
}

fn volume_mounts_match(deployed: &Container, required: &Container) -> bool {
    let mounts = |c: &Container| {
        c.volume_mounts
            .iter()
            .flatten()
            .map(|m| (m.name.clone(), m.mount_path.clone()))
            .collect::<Vec<_>>()
    };
    mounts(deployed) == mounts(required)
}

fn probe_matches(deployed: &Option<Probe>, required: &Option<Probe>) -> bool {
    match (deployed, required) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(d), Some(r)) => {
            let path = |p: &Probe| p.http_get.as_ref().map(|h| (h.path.clone(), h.port.clone()));
            path(d) == path(r)
                && opt_matches(&d.initial_delay_seconds, &r.initial_delay_seconds)
                && opt_matches(&d.period_seconds, &r.period_seconds)
                && opt_matches(&d.timeout_seconds, &r.timeout_seconds)
                && opt_matches(&d.success_threshold, &r.success_threshold)
                && opt_matches(&d.failure_threshold, &r.failure_threshold)
        }
    }
}

fn volume_matches(deployed: &Volume, required: &Volume) -> bool {
    let claim = |v: &Volume| v.persistent_volume_claim.as_ref().map(|c| c.claim_name.clone());
    deployed.name == required.name
        && claim(deployed) == claim(required)
        && deployed.empty_dir.is_some() == required.empty_dir.is_some()
}

/// Service equality: type, ports and selector. Cluster IPs are ignored.
pub fn service_equality(deployed: &ManagedResource, required: &ManagedResource) -> bool {
    let (ManagedResource::Service(deployed_svc), ManagedResource::Service(required_svc)) =
        (deployed, required)
    else {
        return false;
    };
    labels_match(deployed, required) && service_spec_matches(deployed_svc, required_svc)
}

fn service_spec_matches(deployed: &Service, required: &Service) -> bool {
    let (Some(dep), Some(req)) = (&deployed.spec, &required.spec) else {
        return required.spec.is_none();
    };
    let service_type = |t: &Option<String>| t.clone().unwrap_or_else(|| "ClusterIP".to_string());
    if service_type(&dep.type_) != service_type(&req.type_) || dep.selector != req.selector {
        return false;
    }

    let no_ports = Vec::new();
    let dep_ports = dep.ports.as_ref().unwrap_or(&no_ports);
    let req_ports = req.ports.as_ref().unwrap_or(&no_ports);
    dep_ports.len() == req_ports.len()
        && dep_ports
            .iter()
            .zip(req_ports)
            .all(|(d, r)| service_port_matches(d, r))
}

fn service_port_matches(deployed: &ServicePort, required: &ServicePort) -> bool {
    deployed.name == required.name
        && deployed.port == required.port
        && opt_matches(&deployed.target_port, &required.target_port)
        && opt_matches(&deployed.node_port, &required.node_port)
}

/// PVC equality: storage request, access modes and, when set, storage class.
pub fn pvc_equality(deployed: &ManagedResource, required: &ManagedResource) -> bool {
    let (
        ManagedResource::PersistentVolumeClaim(deployed_pvc),
        ManagedResource::PersistentVolumeClaim(required_pvc),
    ) = (deployed, required)
    else {
        return false;
    };
    labels_match(deployed, required) && pvc_spec_matches(deployed_pvc, required_pvc)
}

fn pvc_spec_matches(deployed: &PersistentVolumeClaim, required: &PersistentVolumeClaim) -> bool {
    let (Some(dep), Some(req)) = (&deployed.spec, &required.spec) else {
        return required.spec.is_none();
    };
    let storage = |spec: &k8s_openapi::api::core::v1::PersistentVolumeClaimSpec| {
        spec.resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage").cloned())
    };
    let storage_matches = match (storage(dep), storage(req)) {
        (Some(d), Some(r)) => quantity_matches(&d, &r),
        (d, r) => d == r,
    };
    storage_matches
        && dep.access_modes == req.access_modes
        && opt_matches(&dep.storage_class_name, &req.storage_class_name)
}

/// Secret equality: presence and labels. Contents are never compared.
pub fn secret_equality(deployed: &ManagedResource, required: &ManagedResource) -> bool {
    matches!(
        (deployed, required),
        (ManagedResource::Secret(_), ManagedResource::Secret(_))
    ) && labels_match(deployed, required)
}
