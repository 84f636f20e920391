//! Stack lifecycle orchestration: create, delete, restart and asset mounts.

use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::apps::v1::Deployment;
use metrics::{counter, histogram};
use serde::Serialize;
use stacklab_apply::{asset_mounts, plan_asset_mount, preview, AssetMounts, MountPlan, MountPreview};
use stacklab_core::names::stack_host;
use stacklab_core::{
    now_ts, AssetRepository, Config, Stack, StackKey, StackParams, StackRef, StackRepository, StackStatus,
};
use stacklab_kubehub::{Cluster, DeploymentApi, ResourceApi};
use tracing::{error, info, warn};

use crate::credentials::SecretStore;
use crate::error::StackError;
use crate::pipeline::Pipeline;
use crate::registry::{Registry, StackHandler, Step};

/// Request to reconcile a stack's mounted assets with `asset_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountRequest {
    #[serde(flatten)]
    pub stack: StackRef,
    #[serde(default)]
    pub asset_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountOutcome {
    pub deployment: String,
    pub namespace: String,
    pub volumes: Vec<String>,
    pub unresolved: Vec<String>,
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedStack {
    pub stack: Stack,
    pub completed: Vec<Step>,
    pub mount: Option<MountOutcome>,
}

/// Orchestrates stack lifecycle events against the cluster and the stack repository.
/// Holds no locks: concurrent writes to one stack are arbitrated by resource versions.
pub struct StackManager {
    cluster: Cluster,
    registry: Registry,
    config: Config,
    secrets: Arc<dyn SecretStore>,
    stacks: Arc<dyn StackRepository>,
    assets: Arc<dyn AssetRepository>,
}

impl StackManager {
    pub fn new(
        cluster: Cluster,
        registry: Registry,
        config: Config,
        secrets: Arc<dyn SecretStore>,
        stacks: Arc<dyn StackRepository>,
        assets: Arc<dyn AssetRepository>,
    ) -> Self {
        Self { cluster, registry, config, secrets, stacks, assets }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn resolve(&self, stack: &StackRef) -> Result<(StackHandler, StackKey), StackError> {
        let handler = self.registry.resolve(&stack.stack_type)?;
        let key = StackKey { project_key: stack.project_key.clone(), name: stack.name.clone(), stack_type: handler.stack_type };
        Ok((handler, key))
    }

    fn pipeline<'a>(&'a self, handler: &'a StackHandler, key: &'a StackKey) -> Pipeline<'a> {
        Pipeline { cluster: &self.cluster, config: &self.config, secrets: self.secrets.as_ref(), handler, key }
    }

    pub async fn create_stack(&self, user: &str, params: &StackParams) -> Result<CreatedStack, StackError> {
        let t0 = Instant::now();
        let res = self.create_inner(user, params).await;
        match &res {
            Ok(created) => {
                counter!("stack_create_ok", 1u64);
                histogram!("stack_create_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
                info!(stack = %created.stack.key(), user = %user, "stack created");
            }
            Err(e) => {
                counter!("stack_create_err", 1u64);
                error!(project = %params.project_key, name = %params.name, stack_type = %params.stack_type, error = %e, "stack create failed");
            }
        }
        res
    }

    async fn create_inner(&self, user: &str, params: &StackParams) -> Result<CreatedStack, StackError> {
        let (handler, key) = self.resolve(&params.stack_ref())?;
        let now = now_ts();
        let mut stack = Stack {
            project_key: key.project_key.clone(),
            name: key.name.clone(),
            stack_type: key.stack_type,
            category: handler.category,
            display_name: params.display_name.clone(),
            description: params.description.clone(),
            url: None,
            internal_endpoint: None,
            volume_mount: params.volume_mount.clone(),
            asset_ids: params.asset_ids.clone(),
            status: StackStatus::Requested,
            visible: params.visible,
            shared: false,
            users: vec![user.to_string()],
            created: now,
            updated: now,
        };
        // the record exists before any resource does
        self.stacks.create_or_update(user, &stack).await.map_err(StackError::Repository)?;

        let out = self.pipeline(&handler, &key).create(params).await?;

        let mount = if params.asset_ids.is_empty() {
            None
        } else {
            let req = MountRequest { stack: params.stack_ref(), asset_ids: params.asset_ids.clone() };
            Some(self.mount_assets_on_stack(&req).await?)
        };

        if let Some(svc) = &out.service {
            let port = svc.spec.as_ref().and_then(|s| s.ports.as_ref()).and_then(|p| p.first()).map(|p| p.port);
            let svc_name = svc.metadata.name.clone().unwrap_or_default();
            stack.internal_endpoint = port.map(|p| format!("http://{}.{}:{}", svc_name, key.namespace(), p));
        }
        if out.ingress.is_some() {
            stack.url = Some(format!("https://{}", stack_host(&key.project_key, &key.name, &self.config.datalab.domain)));
        }
        stack.status = StackStatus::Creating;
        stack.updated = now_ts();
        self.stacks.create_or_update(user, &stack).await.map_err(StackError::Repository)?;

        Ok(CreatedStack { stack, completed: out.completed, mount })
    }

    pub async fn delete_stack(&self, user: &str, stack: &StackRef) -> Result<Vec<Step>, StackError> {
        let res = async {
            let (handler, key) = self.resolve(stack)?;
            let completed = self.pipeline(&handler, &key).delete().await?;
            self.stacks.delete_stack(user, &key).await.map_err(StackError::Repository)?;
            info!(stack = %key, user = %user, "stack deleted");
            Ok::<_, StackError>(completed)
        }
        .await;
        match &res {
            Ok(_) => {
                counter!("stack_delete_ok", 1u64);
            }
            Err(e) => {
                counter!("stack_delete_err", 1u64);
                error!(project = %stack.project_key, name = %stack.name, error = %e, "stack delete failed");
            }
        }
        res
    }

    /// Rolling restart of the stack deployment. No manifest is regenerated.
    pub async fn restart_stack(&self, stack: &StackRef) -> Result<Deployment, StackError> {
        let (_, key) = self.resolve(stack)?;
        counter!("stack_restart_total", 1u64);
        info!(stack = %key, "restarting stack");
        Ok(self.cluster.deployments.restart_deployment(&key.namespace(), &key.deployment_name()).await?)
    }

    async fn mount_plan(&self, req: &MountRequest) -> Result<(StackKey, Deployment, AssetMounts, MountPlan), StackError> {
        let (_, key) = self.resolve(&req.stack)?;
        let namespace = key.namespace();
        let deployment_name = key.deployment_name();
        let current = self
            .cluster
            .deployments
            .get(&namespace, &deployment_name)
            .await?
            .ok_or_else(|| StackError::StackDeploymentNotFound { deployment: deployment_name.clone(), namespace: namespace.clone() })?;

        let metadata = if req.asset_ids.is_empty() {
            Vec::new()
        } else {
            let t0 = Instant::now();
            let m = self.assets.get_metadata_with_ids(&req.asset_ids).await.map_err(StackError::Assets)?;
            histogram!("persist_get_ms", t0.elapsed().as_secs_f64() * 1000.0);
            m
        };
        let mounts = asset_mounts(&req.asset_ids, &metadata, &self.config.catalogue);
        if !mounts.unresolved.is_empty() {
            warn!(stack = %key, unresolved = ?mounts.unresolved, "assets without metadata are not mounted");
        }
        let plan = plan_asset_mount(&current, &deployment_name, &mounts);
        Ok((key, current, mounts, plan))
    }

    /// Rewrite the deployment's asset volumes and mounts to exactly `req.asset_ids`
    /// in one merge patch guarded by the observed resource version.
    pub async fn mount_assets_on_stack(&self, req: &MountRequest) -> Result<MountOutcome, StackError> {
        let res = async {
            let (key, current, mounts, plan) = self.mount_plan(req).await?;
            let namespace = key.namespace();
            let deployment_name = key.deployment_name();
            let precondition = current.metadata.resource_version.as_deref();
            let patched = self
                .cluster
                .deployments
                .merge_patch(&namespace, &deployment_name, &plan.patch_body(), precondition)
                .await?;
            info!(stack = %key, volumes = ?plan.volume_names(), "mounted assets");
            Ok::<_, StackError>(MountOutcome {
                deployment: deployment_name,
                namespace,
                volumes: plan.volume_names().into_iter().map(String::from).collect(),
                unresolved: mounts.unresolved,
                resource_version: patched.metadata.resource_version,
            })
        }
        .await;
        match &res {
            Ok(_) => {
                counter!("stack_mount_ok", 1u64);
            }
            Err(e) => {
                counter!("stack_mount_err", 1u64);
                warn!(project = %req.stack.project_key, name = %req.stack.name, error = %e, retryable = e.is_retryable(), "asset mount failed");
            }
        }
        res
    }

    /// The patch `mount_assets_on_stack` would submit, without submitting it.
    pub async fn plan_asset_mount(&self, req: &MountRequest) -> Result<MountPreview, StackError> {
        let (_, current, mounts, plan) = self.mount_plan(req).await?;
        preview(&current, &plan, &mounts).map_err(StackError::Encoding)
    }

    pub async fn list_stacks(&self, project_key: &str) -> Result<Vec<Stack>, StackError> {
        self.stacks.list(project_key).await.map_err(StackError::Repository)
    }

    pub async fn find_stack(&self, stack: &StackRef) -> Result<Option<Stack>, StackError> {
        let (_, key) = self.resolve(stack)?;
        self.stacks.find(&key).await.map_err(StackError::Repository)
    }
}
