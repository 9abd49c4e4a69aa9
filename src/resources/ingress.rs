//! Ingress generation for exposing Nexus on plain Kubernetes.

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use kube::ResourceExt;

use crate::crd::Nexus;
use crate::resources::common::{NEXUS_PORT, child_metadata};

/// Generate the Ingress for a Nexus exposed as `Ingress`.
///
/// Defaulting guarantees a host is set; without one the rule matches any
/// host.
pub fn generate_ingress(resource: &Nexus) -> Ingress {
    let networking = &resource.spec.networking;
    let name = resource.name_any();

    let tls = networking.tls.secret_name.as_ref().map(|secret| {
        vec![IngressTLS {
            hosts: networking.host.clone().map(|host| vec![host]),
            secret_name: Some(secret.clone()),
        }]
    });

    Ingress {
        metadata: child_metadata(resource, name.clone()),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: networking.host.clone(),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name,
                                port: Some(ServiceBackendPort {
                                    number: Some(NEXUS_PORT),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// External URL served by an Ingress.
pub fn ingress_url(resource: &Nexus) -> Option<String> {
    let networking = &resource.spec.networking;
    let scheme = if networking.tls.secret_name.is_some() {
        "https"
    } else {
        "http"
    };
    networking
        .host
        .as_ref()
        .map(|host| format!("{scheme}://{host}"))
}
