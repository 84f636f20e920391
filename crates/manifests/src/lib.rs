//! Stacklab manifests: typed resource documents for each stack family.
//!
//! Generators are pure. The pipeline wraps their output in a manifest
//! document before it reaches a resource client.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use stacklab_core::{StackKey, StackType};

mod cluster;
mod common;
mod error;
mod ingress;
mod notebook;
mod profile;
mod publish;
mod service;
mod storage;

pub use error::GeneratorError;
pub use profile::{profile, CredentialEnv, PortSpec, StackProfile};
pub use storage::{claim, secret};

/// Inputs shared by every deployment generator.
#[derive(Debug, Clone)]
pub struct DeploymentInput<'a> {
    pub key: &'a StackKey,
    pub deployment_name: &'a str,
    pub service_name: &'a str,
    pub image: &'a str,
    /// Project data volume; mounted from `<volume>-claim`.
    pub volume_mount: Option<&'a str>,
    pub source_path: Option<&'a str>,
    pub credential_secret: Option<&'a str>,
    pub home_claim: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceInput<'a> {
    pub service_name: &'a str,
    pub deployment_name: &'a str,
    pub stack_type: StackType,
}

/// Ingress inputs; ports are read from the service the previous step created.
#[derive(Debug, Clone)]
pub struct IngressInput<'a> {
    pub ingress_name: &'a str,
    pub host: &'a str,
    pub service: &'a Service,
    pub labels: BTreeMap<String, String>,
}

pub type DeploymentGenerator = fn(&DeploymentInput<'_>) -> Deployment;
pub type ServiceGenerator = fn(&ServiceInput<'_>) -> Service;
pub type IngressGenerator = fn(&IngressInput<'_>) -> Result<Ingress, GeneratorError>;

/// Generator bundle for one stack type.
#[derive(Clone, Copy)]
pub struct ManifestGenerators {
    pub deployment: DeploymentGenerator,
    pub workers: Option<DeploymentGenerator>,
    pub service: ServiceGenerator,
    pub ingress: IngressGenerator,
}

impl ManifestGenerators {
    pub const NOTEBOOK: Self = Self {
        deployment: notebook::deployment,
        workers: None,
        service: service::service,
        ingress: ingress::ingress,
    };

    pub const PUBLISH: Self = Self {
        deployment: publish::deployment,
        workers: None,
        service: service::service,
        ingress: ingress::ingress,
    };

    pub const CLUSTER: Self = Self {
        deployment: cluster::scheduler,
        workers: Some(cluster::workers),
        service: service::service,
        ingress: ingress::ingress,
    };

    pub fn for_type(stack_type: StackType) -> Self {
        match stack_type {
            StackType::Jupyter | StackType::JupyterLab | StackType::RStudio => Self::NOTEBOOK,
            StackType::Zeppelin => Self { ingress: ingress::ingress_with_connect, ..Self::NOTEBOOK },
            StackType::RShiny | StackType::NbViewer => Self::PUBLISH,
            StackType::Spark => Self { ingress: ingress::ingress_with_connect, ..Self::CLUSTER },
            StackType::Dask => Self::CLUSTER,
        }
    }
}

/// Image for a stack type, honouring a configured override.
pub fn image_for(stack_type: StackType, override_image: Option<&str>) -> String {
    override_image.unwrap_or(profile(stack_type).image).to_string()
}

/// Labels every resource of a stack carries.
pub fn stack_labels(deployment_name: &str, stack_type: StackType) -> BTreeMap<String, String> {
    common::labels(deployment_name, stack_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cluster_types_have_workers() {
        for t in StackType::ALL {
            let has_workers = ManifestGenerators::for_type(t).workers.is_some();
            assert_eq!(has_workers, matches!(t, StackType::Spark | StackType::Dask), "{t}");
        }
    }

    #[test]
    fn image_override_wins() {
        assert_eq!(image_for(StackType::Dask, Some("my/dask:1")), "my/dask:1");
        assert_eq!(image_for(StackType::Dask, None), "daskdev/dask:2024.1.1");
    }
}
