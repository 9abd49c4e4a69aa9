//! Service generation for Nexus.
//!
//! A single Service fronts the Nexus HTTP port. It is a NodePort Service when
//! the CR exposes Nexus that way, a ClusterIP Service otherwise.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::{ExposeType, Nexus};
use crate::resources::common::{NEXUS_PORT, child_metadata, pod_selector_labels};

/// Generate the Service for a Nexus.
pub fn generate_service(resource: &Nexus) -> Service {
    let networking = &resource.spec.networking;
    let node_port = networking.expose && networking.expose_as == Some(ExposeType::NodePort);

    Service {
        metadata: child_metadata(resource, resource.name_any()),
        spec: Some(ServiceSpec {
            type_: Some(if node_port { "NodePort" } else { "ClusterIP" }.to_string()),
            selector: Some(pod_selector_labels(resource)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: NEXUS_PORT,
                target_port: Some(IntOrString::Int(NEXUS_PORT)),
                node_port: if node_port { networking.node_port } else { None },
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// In-cluster base URL of the Nexus server behind the Service.
pub fn service_url(resource: &Nexus) -> String {
    format!(
        "http://{}.{}.svc:{}",
        resource.name_any(),
        resource.namespace().unwrap_or_default(),
        NEXUS_PORT
    )
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
        let mut nexus = Nexus::new("nexus3", NexusSpec::default());
        nexus.metadata.namespace = Some("tools".to_string());
        nexus
    }

    #[test]
    fn test_generate_cluster_ip_service() {
        let svc = generate_service(&test_resource());
        assert_eq!(svc.metadata.name.as_deref(), Some("nexus3"));

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8081);
        assert_eq!(ports[0].node_port, None);
    }

    #[test]
    fn test_generate_node_port_service() {
        let mut resource = test_resource();
        resource.spec.networking.expose = true;
        resource.spec.networking.expose_as = Some(ExposeType::NodePort);
        resource.spec.networking.node_port = Some(31031);

        let spec = generate_service(&resource).spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
        assert_eq!(spec.ports.unwrap()[0].node_port, Some(31031));
    }

    #[test]
    fn test_node_port_ignored_when_not_exposed() {
        let mut resource = test_resource();
        resource.spec.networking.expose_as = Some(ExposeType::NodePort);
        resource.spec.networking.node_port = Some(31031);

        let spec = generate_service(&resource).spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
    }

    #[test]
    fn test_service_url() {
        assert_eq!(service_url(&test_resource()), "http://nexus3.tools.svc:8081");
    }
}
