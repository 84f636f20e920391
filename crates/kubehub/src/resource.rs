use std::marker::PhantomData;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use metrics::counter;
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::patch::{restart_patch, with_precondition};
use crate::{desired_replacement, ClientError, Manifest, ResourceDoc, Verb};

/// Client for one resource kind, addressed by namespace and canonical name.
#[async_trait::async_trait]
pub trait ResourceApi<K: ResourceDoc>: Send + Sync {
    /// Read a resource; absence is `Ok(None)`, not an error.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ClientError>;

    async fn create(&self, namespace: &str, manifest: &Manifest) -> Result<K, ClientError>;

    /// Replace `current` with the manifest, guarded by `current`'s resource version.
    async fn update(&self, namespace: &str, name: &str, manifest: &Manifest, current: &K) -> Result<K, ClientError>;

    /// Submit a JSON merge patch. With a `precondition`, the write only lands
    /// if the live resource version still matches.
    async fn merge_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Json,
        precondition: Option<&str>,
    ) -> Result<K, ClientError>;

    /// Delete a resource; an already-absent resource counts as deleted.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    async fn create_or_update(&self, namespace: &str, name: &str, manifest: &Manifest) -> Result<K, ClientError> {
        match self.get(namespace, name).await? {
            None => {
                counter!("resource_create_total", 1u64);
                self.create(namespace, manifest).await
            }
            Some(current) => {
                counter!("resource_update_total", 1u64);
                self.update(namespace, name, manifest, &current).await
            }
        }
    }
}

#[async_trait::async_trait]
pub trait DeploymentApi: ResourceApi<Deployment> {
    /// Trigger a rolling restart without touching the deployment spec.
    async fn restart_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClientError>;
}

/// kube-rs backed resource client.
pub struct KubeResource<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceDoc> KubeResource<K> {
    pub fn new(client: Client) -> Self {
        Self { client, _kind: PhantomData }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl<K: ResourceDoc> ResourceApi<K> for KubeResource<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ClientError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| ClientError::from_kube(Verb::Get, K::KIND, name, e))
    }

    async fn create(&self, namespace: &str, manifest: &Manifest) -> Result<K, ClientError> {
        let obj: K = manifest.parse()?;
        info!(kind = %K::KIND, name = %manifest.name, namespace = %namespace, "creating resource");
        self.api(namespace)
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|e| ClientError::from_kube(Verb::Create, K::KIND, &manifest.name, e))
    }

    async fn update(&self, namespace: &str, name: &str, manifest: &Manifest, current: &K) -> Result<K, ClientError> {
        let desired = desired_replacement(manifest, current)?;
        info!(kind = %K::KIND, name = %name, namespace = %namespace, rv = ?desired.meta().resource_version, "replacing resource");
        let res = self.api(namespace).replace(name, &PostParams::default(), &desired).await;
        res.map_err(|e| {
            let err = ClientError::from_kube(Verb::Create, K::KIND, name, e);
            if err.is_conflict() {
                counter!("resource_conflict_total", 1u64);
            }
            err
        })
    }

    async fn merge_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Json,
        precondition: Option<&str>,
    ) -> Result<K, ClientError> {
        let body = with_precondition(patch, precondition);
        debug!(kind = %K::KIND, name = %name, namespace = %namespace, patch = %body, "merge patch");
        self.api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await
            .map_err(|e| {
                let err = ClientError::from_kube(Verb::Patch, K::KIND, name, e);
                if err.is_conflict() {
                    counter!("resource_conflict_total", 1u64);
                }
                err
            })
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(kind = %K::KIND, name = %name, namespace = %namespace, "deleted resource");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(kind = %K::KIND, name = %name, namespace = %namespace, "resource already absent");
                Ok(())
            }
            Err(e) => Err(ClientError::from_kube(Verb::Delete, K::KIND, name, e)),
        }
    }
}

#[async_trait::async_trait]
impl DeploymentApi for KubeResource<Deployment> {
    async fn restart_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClientError> {
        let patch = restart_patch(chrono::Utc::now());
        info!(deployment = %name, namespace = %namespace, "rolling restart");
        self.merge_patch(namespace, name, &patch, None).await
    }
}
