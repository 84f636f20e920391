//! In-memory resource clients with an ordered call log, for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;
use serde_json::Value as Json;

use crate::patch::{apply_merge_patch, restart_patch, with_precondition};
use crate::{desired_replacement, ClientError, Cluster, DeploymentApi, Manifest, ResourceApi, ResourceDoc, ResourceKind, Verb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallVerb {
    Get,
    Create,
    Update,
    MergePatch,
    Delete,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: CallVerb,
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

/// Call log shared by every fake client of one cluster.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn record(&self, verb: CallVerb, kind: ResourceKind, namespace: &str, name: &str) {
        self.0.lock().unwrap().push(Call { verb, kind, namespace: namespace.to_string(), name: name.to_string() });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, verb: CallVerb, kind: ResourceKind) -> usize {
        self.0.lock().unwrap().iter().filter(|c| c.verb == verb && c.kind == kind).count()
    }

    /// Calls other than reads.
    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.verb != CallVerb::Get).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Failure injected into the next matching call.
#[derive(Debug, Clone)]
pub enum Failure {
    Rejected { code: u16, message: String },
    Conflict(String),
}

pub struct FakeResource<K> {
    log: CallLog,
    objects: Mutex<BTreeMap<(String, String), K>>,
    failures: Mutex<Vec<(CallVerb, Failure)>>,
    patches: Mutex<Vec<Json>>,
    next_rv: AtomicU64,
}

impl<K: ResourceDoc> FakeResource<K> {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            objects: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
            next_rv: AtomicU64::new(1),
        }
    }

    /// Seed a live object without recording a call.
    pub fn insert(&self, namespace: &str, mut obj: K) {
        obj.meta_mut().namespace = Some(namespace.to_string());
        if obj.meta().resource_version.is_none() {
            self.bump(&mut obj);
        }
        let name = obj.meta().name.clone().unwrap_or_default();
        self.objects.lock().unwrap().insert((namespace.to_string(), name), obj);
    }

    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects.lock().unwrap().get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().map(|(_, n)| n.clone()).collect()
    }

    /// Merge-patch bodies as received, precondition included.
    pub fn patches(&self) -> Vec<Json> {
        self.patches.lock().unwrap().clone()
    }

    pub fn fail_next(&self, verb: CallVerb, failure: Failure) {
        self.failures.lock().unwrap().push((verb, failure));
    }

    fn take_failure(&self, verb: CallVerb, name: &str) -> Option<ClientError> {
        let mut failures = self.failures.lock().unwrap();
        let pos = failures.iter().position(|(v, _)| *v == verb)?;
        let (_, failure) = failures.remove(pos);
        Some(match failure {
            Failure::Rejected { code, message } => {
                let wire_verb = match verb {
                    CallVerb::Get => Verb::Get,
                    CallVerb::Create | CallVerb::Update => Verb::Create,
                    CallVerb::MergePatch | CallVerb::Restart => Verb::Patch,
                    CallVerb::Delete => Verb::Delete,
                };
                ClientError::rejected(wire_verb, K::KIND, code, message)
            }
            Failure::Conflict(message) => ClientError::Conflict { kind: K::KIND, name: name.to_string(), message },
        })
    }

    fn bump(&self, obj: &mut K) {
        let rv = self.next_rv.fetch_add(1, Ordering::SeqCst);
        obj.meta_mut().resource_version = Some(rv.to_string());
    }

    fn conflict(name: &str, message: &str) -> ClientError {
        ClientError::Conflict { kind: K::KIND, name: name.to_string(), message: message.to_string() }
    }

    fn patch_in_place(&self, namespace: &str, name: &str, body: &Json, precondition: Option<&str>) -> Result<K, ClientError> {
        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        let live = objects
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::rejected(Verb::Patch, K::KIND, 404, format!("{} \"{}\" not found", K::KIND, name)))?;
        if let Some(rv) = precondition {
            if live.meta().resource_version.as_deref() != Some(rv) {
                return Err(Self::conflict(name, "the object has been modified"));
            }
        }
        let mut doc = serde_json::to_value(&live).map_err(|source| ClientError::Encoding { kind: K::KIND, source })?;
        apply_merge_patch(&mut doc, body);
        let mut patched: K = serde_json::from_value(doc).map_err(|source| ClientError::Encoding { kind: K::KIND, source })?;
        self.bump(&mut patched);
        objects.insert(key, patched.clone());
        Ok(patched)
    }
}

#[async_trait::async_trait]
impl<K: ResourceDoc> ResourceApi<K> for FakeResource<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ClientError> {
        self.log.record(CallVerb::Get, K::KIND, namespace, name);
        if let Some(err) = self.take_failure(CallVerb::Get, name) {
            return Err(err);
        }
        Ok(self.object(namespace, name))
    }

    async fn create(&self, namespace: &str, manifest: &Manifest) -> Result<K, ClientError> {
        self.log.record(CallVerb::Create, K::KIND, namespace, &manifest.name);
        if let Some(err) = self.take_failure(CallVerb::Create, &manifest.name) {
            return Err(err);
        }
        let mut obj: K = manifest.parse()?;
        if self.object(namespace, &manifest.name).is_some() {
            return Err(Self::conflict(&manifest.name, "already exists"));
        }
        obj.meta_mut().namespace = Some(namespace.to_string());
        self.bump(&mut obj);
        self.objects.lock().unwrap().insert((namespace.to_string(), manifest.name.clone()), obj.clone());
        Ok(obj)
    }

    async fn update(&self, namespace: &str, name: &str, manifest: &Manifest, current: &K) -> Result<K, ClientError> {
        self.log.record(CallVerb::Update, K::KIND, namespace, name);
        if let Some(err) = self.take_failure(CallVerb::Update, name) {
            return Err(err);
        }
        let live_rv = self.object(namespace, name).and_then(|o| o.meta().resource_version.clone());
        if live_rv != current.meta().resource_version {
            return Err(Self::conflict(name, "the object has been modified"));
        }
        let mut desired: K = desired_replacement(manifest, current)?;
        desired.meta_mut().namespace = Some(namespace.to_string());
        self.bump(&mut desired);
        self.objects.lock().unwrap().insert((namespace.to_string(), name.to_string()), desired.clone());
        Ok(desired)
    }

    async fn merge_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Json,
        precondition: Option<&str>,
    ) -> Result<K, ClientError> {
        self.log.record(CallVerb::MergePatch, K::KIND, namespace, name);
        self.patches.lock().unwrap().push(with_precondition(patch, precondition));
        if let Some(err) = self.take_failure(CallVerb::MergePatch, name) {
            return Err(err);
        }
        self.patch_in_place(namespace, name, patch, precondition)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.log.record(CallVerb::Delete, K::KIND, namespace, name);
        if let Some(err) = self.take_failure(CallVerb::Delete, name) {
            return Err(err);
        }
        self.objects.lock().unwrap().remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeploymentApi for FakeResource<Deployment> {
    async fn restart_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClientError> {
        self.log.record(CallVerb::Restart, ResourceKind::Deployment, namespace, name);
        if let Some(err) = self.take_failure(CallVerb::Restart, name) {
            return Err(err);
        }
        self.patch_in_place(namespace, name, &restart_patch(chrono::Utc::now()), None)
    }
}

/// A whole in-memory cluster sharing one call log.
pub struct FakeCluster {
    pub log: CallLog,
    pub deployments: Arc<FakeResource<Deployment>>,
    pub services: Arc<FakeResource<Service>>,
    pub ingresses: Arc<FakeResource<Ingress>>,
    pub secrets: Arc<FakeResource<Secret>>,
    pub claims: Arc<FakeResource<PersistentVolumeClaim>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        let log = CallLog::default();
        Self {
            deployments: Arc::new(FakeResource::new(log.clone())),
            services: Arc::new(FakeResource::new(log.clone())),
            ingresses: Arc::new(FakeResource::new(log.clone())),
            secrets: Arc::new(FakeResource::new(log.clone())),
            claims: Arc::new(FakeResource::new(log.clone())),
            log,
        }
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cluster(&self) -> Cluster {
        Cluster {
            deployments: self.deployments.clone(),
            services: self.services.clone(),
            ingresses: self.ingresses.clone(),
            secrets: self.secrets.clone(),
            claims: self.claims.clone(),
        }
    }
}
