//! Ordered create and delete pipelines over the resource clients.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use stacklab_core::names::{
    deployment_name, ingress_name, pvc_name, secret_path, service_name, stack_credential_secret, stack_host,
    worker_deployment_name,
};
use stacklab_core::{Config, StackKey, StackParams};
use stacklab_kubehub::{Cluster, Manifest, ResourceApi, ResourceDoc};
use stacklab_manifests::{claim, image_for, secret, stack_labels, DeploymentInput, IngressInput, ServiceInput};
use tracing::{debug, info, warn};

use crate::credentials::{Credentials, SecretStore};
use crate::error::{StackError, StepError};
use crate::registry::{StackHandler, Step};

pub(crate) struct Pipeline<'a> {
    pub cluster: &'a Cluster,
    pub config: &'a Config,
    pub secrets: &'a dyn SecretStore,
    pub handler: &'a StackHandler,
    pub key: &'a StackKey,
}

/// What a completed create pipeline produced.
#[derive(Debug, Default)]
pub(crate) struct CreateOutput {
    pub completed: Vec<Step>,
    pub deployment: Option<Deployment>,
    pub service: Option<Service>,
    pub ingress: Option<Ingress>,
}

/// Log the manifest, then create or update the resource.
async fn submit<K, A>(api: &A, namespace: &str, obj: &K) -> Result<K, StepError>
where
    K: ResourceDoc,
    A: ResourceApi<K> + ?Sized,
{
    let manifest = Manifest::from_resource(obj)?;
    info!(kind = %K::KIND, name = %manifest.name, namespace = %namespace, "Creating {} {} with manifest", K::KIND, manifest.name);
    debug!(kind = %K::KIND, name = %manifest.name, content_type = Manifest::CONTENT_TYPE, manifest = %manifest, "manifest");
    Ok(api.create_or_update(namespace, &manifest.name, &manifest).await?)
}

impl<'a> Pipeline<'a> {
    fn namespace(&self) -> String {
        self.key.namespace()
    }

    fn deployment_name(&self) -> String {
        deployment_name(&self.key.name, self.key.stack_type)
    }

    fn secret_path(&self) -> String {
        secret_path(&self.config.datalab.name, &self.deployment_name())
    }

    pub async fn create(&self, params: &StackParams) -> Result<CreateOutput, StackError> {
        let mut out = CreateOutput::default();
        for &step in self.handler.create_steps {
            let res = self.create_step(step, params, &mut out).await;
            if let Err(source) = res {
                warn!(stack = %self.key, step = %step, completed = ?out.completed, error = %source, "create pipeline aborted");
                return Err(StackError::Pipeline { stack: self.key.to_string(), step, completed: out.completed, source });
            }
            out.completed.push(step);
        }
        Ok(out)
    }

    async fn create_step(&self, step: Step, params: &StackParams, out: &mut CreateOutput) -> Result<(), StepError> {
        let ns = self.namespace();
        let t = self.key.stack_type;
        let deployment = self.deployment_name();
        let svc_name = service_name(&self.key.name, t);
        let gens = &self.handler.generators;
        match step {
            Step::Credentials => {
                let Some(fresh) = Credentials::generate(self.handler.credentials) else {
                    return Ok(());
                };
                let stored = self.secrets.ensure_secret(&self.secret_path(), fresh).await.map_err(StepError::Credentials)?;
                let obj = secret(&stack_credential_secret(&self.key.name, t), t, stored.as_map());
                submit(self.cluster.secrets.as_ref(), &ns, &obj).await?;
            }
            Step::HomeClaim => {
                let obj = claim(&pvc_name(&deployment), t, &self.config.home_storage)?;
                submit(self.cluster.claims.as_ref(), &ns, &obj).await?;
            }
            Step::Deployment | Step::Workers => {
                let image = image_for(t, self.config.image_override(t));
                let credential_secret = self.handler.has_step(Step::Credentials).then(|| stack_credential_secret(&self.key.name, t));
                let home_claim = self.handler.has_step(Step::HomeClaim).then(|| pvc_name(&deployment));
                let input = DeploymentInput {
                    key: self.key,
                    deployment_name: &deployment,
                    service_name: &svc_name,
                    image: &image,
                    volume_mount: params.volume_mount.as_deref(),
                    source_path: params.source_path.as_deref(),
                    credential_secret: credential_secret.as_deref(),
                    home_claim: home_claim.as_deref(),
                };
                if step == Step::Deployment {
                    let obj = (gens.deployment)(&input);
                    out.deployment = Some(submit(self.cluster.deployments.as_ref(), &ns, &obj).await?);
                } else if let Some(workers) = gens.workers {
                    submit(self.cluster.deployments.as_ref(), &ns, &workers(&input)).await?;
                } else {
                    debug!(stack = %self.key, "stack type runs no workers");
                }
            }
            Step::Service => {
                let obj = (gens.service)(&ServiceInput { service_name: &svc_name, deployment_name: &deployment, stack_type: t });
                out.service = Some(submit(self.cluster.services.as_ref(), &ns, &obj).await?);
            }
            Step::Ingress | Step::IngressWithConnect => {
                let service = out.service.as_ref().ok_or(StepError::MissingInput { step, needs: Step::Service })?;
                let host = stack_host(&self.key.project_key, &self.key.name, &self.config.datalab.domain);
                let ing_name = ingress_name(&self.key.name, t);
                let obj = (gens.ingress)(&IngressInput {
                    ingress_name: &ing_name,
                    host: &host,
                    service,
                    labels: stack_labels(&deployment, t),
                })?;
                out.ingress = Some(submit(self.cluster.ingresses.as_ref(), &ns, &obj).await?);
            }
        }
        Ok(())
    }

    /// Tear down in reverse create order. Absent resources count as deleted.
    pub async fn delete(&self) -> Result<Vec<Step>, StackError> {
        let mut completed = Vec::new();
        for step in self.handler.delete_steps() {
            let res = self.delete_step(step).await;
            if let Err(source) = res {
                warn!(stack = %self.key, step = %step, completed = ?completed, error = %source, "delete pipeline aborted");
                return Err(StackError::Pipeline { stack: self.key.to_string(), step, completed, source });
            }
            completed.push(step);
        }
        Ok(completed)
    }

    async fn delete_step(&self, step: Step) -> Result<(), StepError> {
        let ns = self.namespace();
        let t = self.key.stack_type;
        let deployment = self.deployment_name();
        match step {
            Step::Ingress | Step::IngressWithConnect => {
                self.cluster.ingresses.delete(&ns, &ingress_name(&self.key.name, t)).await?;
            }
            Step::Service => self.cluster.services.delete(&ns, &service_name(&self.key.name, t)).await?,
            Step::Workers => self.cluster.deployments.delete(&ns, &worker_deployment_name(&deployment)).await?,
            Step::Deployment => self.cluster.deployments.delete(&ns, &deployment).await?,
            Step::HomeClaim => self.cluster.claims.delete(&ns, &pvc_name(&deployment)).await?,
            Step::Credentials => {
                self.cluster.secrets.delete(&ns, &stack_credential_secret(&self.key.name, t)).await?;
                self.secrets.delete_secret(&self.secret_path()).await.map_err(StepError::Credentials)?;
            }
        }
        info!(stack = %self.key, step = %step, "deleted");
        Ok(())
    }
}
