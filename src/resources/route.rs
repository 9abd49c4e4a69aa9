//! OpenShift Route generation.
//!
//! k8s-openapi has no Route type, so a minimal serde representation is
//! defined here and applied through `DynamicObject`.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::crd::Nexus;
use crate::resources::common::child_metadata;

pub const ROUTE_GROUP: &str = "route.openshift.io";
pub const ROUTE_VERSION: &str = "v1";
pub const ROUTE_KIND: &str = "Route";

/// OpenShift Route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: RouteSpec,
    /// Left opaque; only read back for the admitted host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Assigned by the router when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub to: RouteTargetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouteTls>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTls {
    pub termination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
}

impl Route {
    /// Host from the spec, or the one the router admitted.
    pub fn host(&self) -> Option<String> {
        self.spec.host.clone().or_else(|| {
            self.status
                .as_ref()?
                .get("ingress")?
                .get(0)?
                .get("host")?
                .as_str()
                .map(str::to_string)
        })
    }

    /// External URL of the route, once a host is known.
    pub fn url(&self) -> Option<String> {
        let scheme = if self.spec.tls.is_some() { "https" } else { "http" };
        self.host().map(|host| format!("{scheme}://{host}"))
    }
}

/// Generate the Route for a Nexus exposed as `Route`.
pub fn generate_route(resource: &Nexus) -> Route {
    let networking = &resource.spec.networking;
    let name = resource.name_any();

    Route {
        api_version: format!("{ROUTE_GROUP}/{ROUTE_VERSION}"),
        kind: ROUTE_KIND.to_string(),
        metadata: child_metadata(resource, name.clone()),
        spec: RouteSpec {
            host: networking.host.clone(),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name,
                weight: None,
            },
            port: Some(RoutePort {
                target_port: IntOrString::String("http".to_string()),
            }),
            tls: networking.tls.mandatory.then(|| RouteTls {
                termination: "edge".to_string(),
                insecure_edge_termination_policy: Some("Redirect".to_string()),
            }),
        },
        status: None,
    }
}
