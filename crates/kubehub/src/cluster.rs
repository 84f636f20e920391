use std::sync::Arc;

use anyhow::Result;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;

use crate::{DeploymentApi, KubeResource, ResourceApi};

/// One resource client per kind a stack is built from.
#[derive(Clone)]
pub struct Cluster {
    pub deployments: Arc<dyn DeploymentApi>,
    pub services: Arc<dyn ResourceApi<Service>>,
    pub ingresses: Arc<dyn ResourceApi<Ingress>>,
    pub secrets: Arc<dyn ResourceApi<Secret>>,
    pub claims: Arc<dyn ResourceApi<PersistentVolumeClaim>>,
}

impl Cluster {
    pub fn from_client(client: Client) -> Self {
        Self {
            deployments: Arc::new(KubeResource::<Deployment>::new(client.clone())),
            services: Arc::new(KubeResource::<Service>::new(client.clone())),
            ingresses: Arc::new(KubeResource::<Ingress>::new(client.clone())),
            secrets: Arc::new(KubeResource::<Secret>::new(client.clone())),
            claims: Arc::new(KubeResource::<PersistentVolumeClaim>::new(client)),
        }
    }

    /// Clients for the current kube context.
    pub async fn connect() -> Result<Self> {
        let client = crate::get_kube_client().await?;
        Ok(Self::from_client(client))
    }
}
