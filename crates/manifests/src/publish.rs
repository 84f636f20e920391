//! Publishing stacks serving content from the project data volume: rshiny, nbviewer.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use stacklab_core::StackType;

use crate::common::{container_ports, data_volume, env, some_if_any, split};
use crate::profile::profile;
use crate::DeploymentInput;

pub fn deployment(input: &DeploymentInput<'_>) -> Deployment {
    let stack_type = input.key.stack_type;
    let profile = profile(stack_type);
    // the published directory is the only part of the volume the pod sees
    let (volumes, mounts) = split([data_volume(input, profile.data_path, input.source_path)]);
    let command = match stack_type {
        StackType::NbViewer => Some(vec![
            "python".to_string(),
            "-m".to_string(),
            "nbviewer".to_string(),
            format!("--port={}", profile.ports[0].port),
            format!("--localfiles={}", profile.data_path),
        ]),
        _ => None,
    };
    let container = Container {
        name: input.deployment_name.to_string(),
        image: Some(input.image.to_string()),
        command,
        ports: Some(container_ports(&profile)),
        env: some_if_any(env(input, &profile)),
        volume_mounts: some_if_any(mounts),
        ..Default::default()
    };
    crate::common::deployment(input.deployment_name, stack_type, 1, container, volumes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacklab_core::StackKey;

    #[test]
    fn rshiny_mounts_only_the_source_path() {
        let k = StackKey { project_key: "proj".into(), name: "app".into(), stack_type: StackType::RShiny };
        let input = DeploymentInput {
            key: &k,
            deployment_name: "rshiny-app",
            service_name: "rshiny-app",
            image: "rocker/shiny:4.3",
            volume_mount: Some("projectdata"),
            source_path: Some("/apps/census"),
            credential_secret: None,
            home_claim: Some("ignored"),
        };
        let pod = deployment(&input).spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.volumes.as_ref().unwrap().len(), 1);
        let m = &pod.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(m.mount_path, "/srv/shiny-server");
        assert_eq!(m.sub_path.as_deref(), Some("apps/census"));
        assert!(pod.containers[0].command.is_none());
    }

    #[test]
    fn nbviewer_serves_local_files() {
        let k = StackKey { project_key: "proj".into(), name: "nbs".into(), stack_type: StackType::NbViewer };
        let input = DeploymentInput {
            key: &k,
            deployment_name: "nbviewer-nbs",
            service_name: "nbviewer-nbs",
            image: "jupyter/nbviewer:latest",
            volume_mount: Some("projectdata"),
            source_path: Some("notebooks"),
            credential_secret: None,
            home_claim: None,
        };
        let pod = deployment(&input).spec.unwrap().template.spec.unwrap();
        let cmd = pod.containers[0].command.as_ref().unwrap();
        assert!(cmd.contains(&"--localfiles=/data".to_string()));
        assert!(cmd.contains(&"--port=9090".to_string()));
    }
}
