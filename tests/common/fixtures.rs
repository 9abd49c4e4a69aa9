//! Test fixtures and builder patterns for Nexus.

#![allow(dead_code)]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nexus_operator::crd::{AutomaticUpdateSpec, ExposeType, Nexus, NexusSpec};
use std::collections::BTreeMap;

/// Builder for creating Nexus test fixtures.
///
/// # Example
/// ```
/// let nexus = NexusBuilder::new("nexus3")
///     .namespace("tools")
///     .follow_minor(25)
///     .persistent("10Gi")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct NexusBuilder {
    name: String,
    namespace: String,
    spec: NexusSpec,
    labels: BTreeMap<String, String>,
    generation: Option<i64>,
    uid: Option<String>,
}

impl NexusBuilder {
    /// Create a new builder with automatic updates off, so no tag source
    /// is consulted unless asked for.
    pub fn new(name: impl Into<String>) -> Self {
        let mut spec = NexusSpec::default();
        spec.automatic_update.disabled = true;
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            spec,
            labels: BTreeMap::new(),
            generation: None,
            uid: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn replicas(mut self, replicas: i32) -> Self {
        self.spec.replicas = replicas;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = image.into();
        self
    }

    /// Enable automatic updates following `minor`.
    pub fn follow_minor(mut self, minor: u32) -> Self {
        self.spec.automatic_update = AutomaticUpdateSpec {
            disabled: false,
            minor_version: Some(minor),
        };
        self
    }

    /// Enable automatic updates following the latest minor.
    pub fn follow_latest(mut self) -> Self {
        self.spec.automatic_update = AutomaticUpdateSpec::default();
        self
    }

    pub fn persistent(mut self, size: impl Into<String>) -> Self {
        self.spec.persistence.persistent = true;
        self.spec.persistence.volume_size = size.into();
        self
    }

    /// Expose through an Ingress on `host`.
    pub fn ingress(mut self, host: impl Into<String>) -> Self {
        self.spec.networking.expose = true;
        self.spec.networking.expose_as = Some(ExposeType::Ingress);
        self.spec.networking.host = Some(host.into());
        self
    }

    /// Expose through a Route.
    pub fn route(mut self) -> Self {
        self.spec.networking.expose = true;
        self.spec.networking.expose_as = Some(ExposeType::Route);
        self
    }

    pub fn node_port(mut self, port: i32) -> Self {
        self.spec.networking.expose = true;
        self.spec.networking.expose_as = Some(ExposeType::NodePort);
        self.spec.networking.node_port = Some(port);
        self
    }

    pub fn without_server_operations(mut self) -> Self {
        self.spec.server_operations.disable_operator_user_creation = true;
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn build(self) -> Nexus {
        Nexus {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                labels: if self.labels.is_empty() {
                    None
                } else {
                    Some(self.labels)
                },
                generation: self.generation,
                uid: self.uid,
                ..Default::default()
            },
            spec: self.spec,
            status: None,
        }
    }
}

impl Default for NexusBuilder {
    fn default() -> Self {
        Self::new("nexus3")
    }
}

/// A Nexus with every default, in `namespace`.
pub fn minimal_nexus(name: &str, namespace: &str) -> Nexus {
    NexusBuilder::new(name).namespace(namespace).build()
}
