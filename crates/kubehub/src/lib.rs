//! Stacklab kubehub: resource clients for the kinds a stack is built from.

#![forbid(unsafe_code)]

use anyhow::Result;
use kube::Client;
use tokio::sync::OnceCell;
use tracing::info;

mod cluster;
mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
mod manifest;
pub mod patch;
mod resource;

pub use cluster::Cluster;
pub use error::{ClientError, Verb};
pub use manifest::{desired_replacement, Manifest, ResourceDoc, ResourceKind};
pub use resource::{DeploymentApi, KubeResource, ResourceApi};

static CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Shared client for the current kube context, inferred once per process.
pub async fn get_kube_client() -> Result<Client> {
    let client = CLIENT
        .get_or_try_init(|| async {
            let c = Client::try_default().await?;
            info!(namespace = %c.default_namespace(), "kube client ready");
            Ok::<Client, kube::Error>(c)
        })
        .await?;
    Ok(client.clone())
}
