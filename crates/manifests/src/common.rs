use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use stacklab_core::names::pvc_name;
use stacklab_core::StackType;

use crate::profile::StackProfile;
use crate::DeploymentInput;

pub(crate) const NAME_LABEL: &str = "name";
pub(crate) const USER_POD_LABEL: &str = "user-pod";

pub(crate) fn labels(name: &str, stack_type: StackType) -> BTreeMap<String, String> {
    BTreeMap::from([
        (NAME_LABEL.to_string(), name.to_string()),
        (USER_POD_LABEL.to_string(), stack_type.to_string()),
    ])
}

pub(crate) fn selector(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(NAME_LABEL.to_string(), name.to_string())])
}

pub(crate) fn meta(name: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta { name: Some(name.to_string()), labels: Some(labels), ..Default::default() }
}

pub(crate) fn container_ports(profile: &StackProfile) -> Vec<ContainerPort> {
    profile
        .ports
        .iter()
        .map(|p| ContainerPort { name: Some(p.name.to_string()), container_port: p.port, ..Default::default() })
        .collect()
}

pub(crate) fn plain_env(vars: &[(&str, &str)]) -> Vec<EnvVar> {
    vars.iter()
        .map(|(k, v)| EnvVar { name: k.to_string(), value: Some(v.to_string()), value_from: None })
        .collect()
}

/// Fixed env plus credential env sourced from the stack secret, if one exists.
pub(crate) fn env(input: &DeploymentInput<'_>, profile: &StackProfile) -> Vec<EnvVar> {
    let mut env = plain_env(profile.extra_env);
    if let Some(secret) = input.credential_secret {
        env.extend(profile.credential_env.iter().map(|c| EnvVar {
            name: c.env.to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(secret.to_string()),
                    key: c.key.to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
        }));
    }
    env
}

fn claim_volume(volume: &str, claim: String) -> Volume {
    Volume {
        name: volume.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource { claim_name: claim, read_only: None }),
        ..Default::default()
    }
}

/// Shared project data volume, backed by `<volume>-claim`.
pub(crate) fn data_volume(input: &DeploymentInput<'_>, mount_path: &str, sub_path: Option<&str>) -> Option<(Volume, VolumeMount)> {
    let volume = input.volume_mount?;
    let mount = VolumeMount {
        name: volume.to_string(),
        mount_path: mount_path.to_string(),
        sub_path: sub_path.map(|s| s.trim_start_matches('/').to_string()),
        ..Default::default()
    };
    Some((claim_volume(volume, pvc_name(volume)), mount))
}

pub(crate) fn home_volume(input: &DeploymentInput<'_>, profile: &StackProfile) -> Option<(Volume, VolumeMount)> {
    let claim = input.home_claim?;
    let path = profile.home_path?;
    let mount = VolumeMount { name: "home".into(), mount_path: path.to_string(), ..Default::default() };
    Some((claim_volume("home", claim.to_string()), mount))
}

/// Pod volumes and the main container's mounts, in a stable order.
pub(crate) fn split(pairs: impl IntoIterator<Item = Option<(Volume, VolumeMount)>>) -> (Vec<Volume>, Vec<VolumeMount>) {
    pairs.into_iter().flatten().unzip()
}

pub(crate) fn deployment(name: &str, stack_type: StackType, replicas: i32, container: Container, volumes: Vec<Volume>) -> Deployment {
    let labels = labels(name, stack_type);
    Deployment {
        metadata: meta(name, labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector { match_labels: Some(selector(name)), ..Default::default() },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: if volumes.is_empty() { None } else { Some(volumes) },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn some_if_any<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() { None } else { Some(v) }
}
