use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Resource kinds a stack is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    Service,
    Ingress,
    Secret,
    PersistentVolumeClaim,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
            ResourceKind::Ingress => "ingress",
            ResourceKind::Secret => "secret",
            ResourceKind::PersistentVolumeClaim => "persistent volume claim",
        };
        f.write_str(s)
    }
}

/// Namespaced k8s-openapi object the resource clients know how to manage.
pub trait ResourceDoc:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Serialize
    + DeserializeOwned
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
    const KIND: ResourceKind;

    /// Copy server-owned fields of the live object onto a desired replacement
    /// so a PUT is accepted and guarded by the live resource version.
    fn carry_over(&mut self, current: &Self) {
        self.meta_mut().resource_version = current.meta().resource_version.clone();
    }
}

impl ResourceDoc for Deployment {
    const KIND: ResourceKind = ResourceKind::Deployment;
}

impl ResourceDoc for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn carry_over(&mut self, current: &Self) {
        self.metadata.resource_version = current.metadata.resource_version.clone();
        // clusterIP is immutable once allocated
        if let (Some(desired), Some(live)) = (self.spec.as_mut(), current.spec.as_ref()) {
            desired.cluster_ip = live.cluster_ip.clone();
            desired.cluster_ips = live.cluster_ips.clone();
        }
    }
}

impl ResourceDoc for Ingress {
    const KIND: ResourceKind = ResourceKind::Ingress;
}

impl ResourceDoc for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;
}

impl ResourceDoc for PersistentVolumeClaim {
    const KIND: ResourceKind = ResourceKind::PersistentVolumeClaim;

    fn carry_over(&mut self, current: &Self) {
        self.metadata.resource_version = current.metadata.resource_version.clone();
        // a bound claim's spec is immutable apart from its storage request
        self.spec = current.spec.clone();
    }
}

/// Declarative YAML document for one resource, as generated for a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub kind: ResourceKind,
    pub name: String,
    pub yaml: String,
}

impl Manifest {
    /// Media type of the serialized document.
    pub const CONTENT_TYPE: &'static str = "application/yaml";

    pub fn from_resource<K: ResourceDoc>(obj: &K) -> Result<Self, ClientError> {
        let yaml = serde_yaml::to_string(obj).map_err(|source| ClientError::Manifest { kind: K::KIND, source })?;
        let name = obj.meta().name.clone().unwrap_or_default();
        Ok(Self { kind: K::KIND, name, yaml })
    }

    pub fn parse<K: ResourceDoc>(&self) -> Result<K, ClientError> {
        serde_yaml::from_str(&self.yaml).map_err(|source| ClientError::Manifest { kind: K::KIND, source })
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.yaml)
    }
}

/// Parse a manifest and stamp the live object's server-owned fields onto it.
pub fn desired_replacement<K: ResourceDoc>(manifest: &Manifest, current: &K) -> Result<K, ClientError> {
    let mut desired: K = manifest.parse()?;
    desired.carry_over(current);
    Ok(desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service(name: &str, rv: Option<&str>, cluster_ip: Option<&str>) -> Service {
        Service {
            metadata: ObjectMeta { name: Some(name.into()), resource_version: rv.map(Into::into), ..Default::default() },
            spec: Some(ServiceSpec {
                type_: Some("NodePort".into()),
                cluster_ip: cluster_ip.map(Into::into),
                ports: Some(vec![ServicePort { port: 8888, ..Default::default() }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn manifest_is_yaml_with_kind_and_name() {
        let m = Manifest::from_resource(&service("test-service", None, None)).unwrap();
        assert_eq!(m.kind, ResourceKind::Service);
        assert_eq!(m.name, "test-service");
        assert!(m.yaml.contains("kind: Service"), "yaml={}", m.yaml);
        assert!(m.yaml.contains("apiVersion: v1"), "yaml={}", m.yaml);
        let back: Service = m.parse().unwrap();
        assert_eq!(back.metadata.name.as_deref(), Some("test-service"));
        assert_eq!(Manifest::CONTENT_TYPE, "application/yaml");
        // the document is plain YAML, not a JSON object
        assert!(serde_json::from_str::<serde_json::Value>(&m.yaml).is_err());
    }

    #[test]
    fn hand_written_yaml_parses() {
        let m = Manifest {
            kind: ResourceKind::Service,
            name: "test-service".into(),
            yaml: "apiVersion: v1\nkind: Service\nmetadata:\n  name: test-service\nspec:\n  type: NodePort\n".into(),
        };
        let svc: Service = m.parse().unwrap();
        assert_eq!(svc.spec.unwrap().type_.as_deref(), Some("NodePort"));
    }

    #[test]
    fn garbage_yaml_is_a_manifest_error() {
        let m = Manifest { kind: ResourceKind::Service, name: "x".into(), yaml: "kind: [".into() };
        let err = m.parse::<Service>().unwrap_err();
        assert!(matches!(err, ClientError::Manifest { kind: ResourceKind::Service, .. }));
    }

    #[test]
    fn replacement_carries_resource_version_and_cluster_ip() {
        let live = service("test-service", Some("42"), Some("10.0.0.7"));
        let m = Manifest::from_resource(&service("test-service", None, None)).unwrap();
        let desired: Service = desired_replacement(&m, &live).unwrap();
        assert_eq!(desired.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(desired.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.7"));
    }
}
