//! `ClusterStore` backed by the Kubernetes API server.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ClusterStore;
use crate::OPERATOR_NAME;
use crate::crd::Nexus;
use crate::resources::route::{ROUTE_GROUP, ROUTE_KIND, ROUTE_VERSION};
use crate::resources::{ManagedKind, ManagedResource, ResourceKey, Route};

/// Store talking to the API server through a `kube::Client`.
///
/// Routes have no typed API in k8s-openapi and go through `DynamicObject`.
#[derive(Clone)]
pub struct ApiStore {
    client: Client,
}

impl ApiStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn route_api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &route_api_resource())
    }
}

fn route_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        ROUTE_GROUP,
        ROUTE_VERSION,
        ROUTE_KIND,
    ))
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

fn convert<T: Serialize, U: DeserializeOwned>(value: &T) -> kube::Result<U> {
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(kube::Error::SerdeError)
}

async fn get_typed<K>(api: Api<K>, name: &str) -> kube::Result<Option<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.get_opt(name).await
}

async fn delete_typed<K>(api: Api<K>, name: &str) -> kube::Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ClusterStore for ApiStore {
    async fn get(&self, key: &ResourceKey) -> kube::Result<Option<ManagedResource>> {
        let (ns, name) = (key.namespace.as_str(), key.name.as_str());
        let found = match key.kind {
            ManagedKind::ServiceAccount => get_typed(self.api::<ServiceAccount>(ns), name)
                .await?
                .map(ManagedResource::ServiceAccount),
            ManagedKind::Secret => get_typed(self.api::<Secret>(ns), name)
                .await?
                .map(ManagedResource::Secret),
            ManagedKind::PersistentVolumeClaim => {
                get_typed(self.api::<PersistentVolumeClaim>(ns), name)
                    .await?
                    .map(ManagedResource::PersistentVolumeClaim)
            }
            ManagedKind::Deployment => get_typed(self.api::<Deployment>(ns), name)
                .await?
                .map(ManagedResource::Deployment),
            ManagedKind::Service => get_typed(self.api::<Service>(ns), name)
                .await?
                .map(ManagedResource::Service),
            ManagedKind::Ingress => get_typed(self.api::<Ingress>(ns), name)
                .await?
                .map(ManagedResource::Ingress),
            ManagedKind::Route => match get_typed(self.route_api(ns), name).await? {
                Some(obj) => Some(ManagedResource::Route(convert::<_, Route>(&obj)?)),
                None => None,
            },
        };
        Ok(found)
    }

    async fn create(&self, resource: &ManagedResource) -> kube::Result<ManagedResource> {
        let key = resource.key();
        let (ns, pp) = (key.namespace.as_str(), post_params());
        Ok(match resource {
            ManagedResource::ServiceAccount(r) => {
                ManagedResource::ServiceAccount(self.api(ns).create(&pp, r).await?)
            }
            ManagedResource::Secret(r) => ManagedResource::Secret(self.api(ns).create(&pp, r).await?),
            ManagedResource::PersistentVolumeClaim(r) => {
                ManagedResource::PersistentVolumeClaim(self.api(ns).create(&pp, r).await?)
            }
            ManagedResource::Deployment(r) => {
                ManagedResource::Deployment(self.api(ns).create(&pp, r).await?)
            }
            ManagedResource::Service(r) => {
                ManagedResource::Service(self.api(ns).create(&pp, r).await?)
            }
            ManagedResource::Ingress(r) => {
                ManagedResource::Ingress(self.api(ns).create(&pp, r).await?)
            }
            ManagedResource::Route(r) => {
                let obj: DynamicObject = convert(r)?;
                let created = self.route_api(ns).create(&pp, &obj).await?;
                ManagedResource::Route(convert(&created)?)
            }
        })
    }

    async fn update(&self, resource: &ManagedResource) -> kube::Result<ManagedResource> {
        let key = resource.key();
        let (ns, name, pp) = (key.namespace.as_str(), key.name.as_str(), post_params());
        Ok(match resource {
            ManagedResource::ServiceAccount(r) => {
                ManagedResource::ServiceAccount(self.api(ns).replace(name, &pp, r).await?)
            }
            ManagedResource::Secret(r) => {
                ManagedResource::Secret(self.api(ns).replace(name, &pp, r).await?)
            }
            ManagedResource::PersistentVolumeClaim(r) => {
                ManagedResource::PersistentVolumeClaim(self.api(ns).replace(name, &pp, r).await?)
            }
            ManagedResource::Deployment(r) => {
                ManagedResource::Deployment(self.api(ns).replace(name, &pp, r).await?)
            }
            ManagedResource::Service(r) => {
                ManagedResource::Service(self.api(ns).replace(name, &pp, r).await?)
            }
            ManagedResource::Ingress(r) => {
                ManagedResource::Ingress(self.api(ns).replace(name, &pp, r).await?)
            }
            ManagedResource::Route(r) => {
                let obj: DynamicObject = convert(r)?;
                let replaced = self.route_api(ns).replace(name, &pp, &obj).await?;
                ManagedResource::Route(convert(&replaced)?)
            }
        })
    }

    async fn delete(&self, key: &ResourceKey) -> kube::Result<()> {
        let (ns, name) = (key.namespace.as_str(), key.name.as_str());
        match key.kind {
            ManagedKind::ServiceAccount => delete_typed(self.api::<ServiceAccount>(ns), name).await,
            ManagedKind::Secret => delete_typed(self.api::<Secret>(ns), name).await,
            ManagedKind::PersistentVolumeClaim => {
                delete_typed(self.api::<PersistentVolumeClaim>(ns), name).await
            }
            ManagedKind::Deployment => delete_typed(self.api::<Deployment>(ns), name).await,
            ManagedKind::Service => delete_typed(self.api::<Service>(ns), name).await,
            ManagedKind::Ingress => delete_typed(self.api::<Ingress>(ns), name).await,
            ManagedKind::Route => delete_typed(self.route_api(ns), name).await,
        }
    }

    async fn get_nexus(&self, namespace: &str, name: &str) -> kube::Result<Nexus> {
        self.api::<Nexus>(namespace).get(name).await
    }

    async fn replace_nexus(&self, nexus: &Nexus) -> kube::Result<Nexus> {
        let (ns, name) = nexus_identity(nexus);
        self.api::<Nexus>(&ns).replace(&name, &post_params(), nexus).await
    }

    async fn replace_nexus_status(&self, nexus: &Nexus) -> kube::Result<Nexus> {
        let (ns, name) = nexus_identity(nexus);
        let body = serde_json::to_vec(nexus).map_err(kube::Error::SerdeError)?;
        self.api::<Nexus>(&ns)
            .replace_status(&name, &post_params(), body)
            .await
    }
}

fn nexus_identity(nexus: &Nexus) -> (String, String) {
    (
        nexus.metadata.namespace.clone().unwrap_or_default(),
        nexus.metadata.name.clone().unwrap_or_default(),
    )
}
