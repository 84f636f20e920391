//! Per-stack credentials and the store that keeps them.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use stacklab_kubehub::{Manifest, ResourceApi};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const RSTUDIO_USER: &str = "datalab";
const MANAGED_BY: (&str, &str) = ("app.kubernetes.io/managed-by", "stacklab");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    None,
    Token,
    UsernamePassword,
}

#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials(BTreeMap<String, String>);

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // keys only
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl Credentials {
    /// Fresh credentials for a stack, or `None` for types that take none.
    pub fn generate(kind: CredentialKind) -> Option<Self> {
        let secret = || Uuid::new_v4().to_string();
        let data = match kind {
            CredentialKind::None => return None,
            CredentialKind::Token => BTreeMap::from([("token".to_string(), secret())]),
            CredentialKind::UsernamePassword => BTreeMap::from([
                ("username".to_string(), RSTUDIO_USER.to_string()),
                ("password".to_string(), secret()),
            ]),
        };
        Some(Self(data))
    }

    pub fn from_map(data: BTreeMap<String, String>) -> Self {
        Self(data)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Credential store keyed by `<datalab>/notebooks/<id>` paths.
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Store `value` unless the path already holds credentials; returns what is stored.
    async fn ensure_secret(&self, path: &str, value: Credentials) -> Result<Credentials>;

    /// Remove the path; a missing path is not an error.
    async fn delete_secret(&self, path: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySecretStore {
    inner: Mutex<BTreeMap<String, Credentials>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<Credentials> {
        self.inner.lock().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        self.inner.lock().await.keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl SecretStore for MemorySecretStore {
    async fn ensure_secret(&self, path: &str, value: Credentials) -> Result<Credentials> {
        let mut inner = self.inner.lock().await;
        Ok(inner.entry(path.to_string()).or_insert(value).clone())
    }

    async fn delete_secret(&self, path: &str) -> Result<()> {
        self.inner.lock().await.remove(path);
        Ok(())
    }
}

/// Keeps credentials as Secrets in a dedicated namespace. The secret name is
/// the path with `/` replaced by `.`.
pub struct ClusterSecretStore {
    secrets: Arc<dyn ResourceApi<Secret>>,
    namespace: String,
}

impl ClusterSecretStore {
    pub fn new(secrets: Arc<dyn ResourceApi<Secret>>, namespace: impl Into<String>) -> Self {
        Self { secrets, namespace: namespace.into() }
    }

    pub fn secret_name(path: &str) -> String {
        path.trim_matches('/').replace('/', ".")
    }
}

fn read_secret(secret: &Secret) -> Result<Credentials> {
    let mut out = BTreeMap::new();
    if let Some(data) = &secret.data {
        for (k, v) in data {
            let s = String::from_utf8(v.0.clone()).with_context(|| format!("secret key {} is not utf-8", k))?;
            out.insert(k.clone(), s);
        }
    }
    if let Some(data) = &secret.string_data {
        out.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Ok(Credentials(out))
}

#[async_trait::async_trait]
impl SecretStore for ClusterSecretStore {
    async fn ensure_secret(&self, path: &str, value: Credentials) -> Result<Credentials> {
        let name = Self::secret_name(path);
        if let Some(existing) = self.secrets.get(&self.namespace, &name).await? {
            debug!(secret = %name, namespace = %self.namespace, "credentials already stored");
            return read_secret(&existing);
        }
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(BTreeMap::from([(MANAGED_BY.0.to_string(), MANAGED_BY.1.to_string())])),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(value.0.clone()),
            ..Default::default()
        };
        let manifest = Manifest::from_resource(&secret)?;
        match self.secrets.create(&self.namespace, &manifest).await {
            Ok(_) => {
                info!(secret = %name, namespace = %self.namespace, "stored credentials");
                Ok(value)
            }
            Err(e) if e.is_conflict() => {
                // a concurrent writer stored it between the read and the create
                match self.secrets.get(&self.namespace, &name).await? {
                    Some(existing) => {
                        debug!(secret = %name, namespace = %self.namespace, "credentials stored concurrently");
                        read_secret(&existing)
                    }
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_secret(&self, path: &str) -> Result<()> {
        let name = Self::secret_name(path);
        self.secrets.delete(&self.namespace, &name).await?;
        Ok(())
    }
}
