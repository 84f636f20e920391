//! Interactive notebook stacks: jupyter, jupyterlab, zeppelin, rstudio.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;

use crate::common::{container_ports, data_volume, env, home_volume, some_if_any, split};
use crate::profile::profile;
use crate::DeploymentInput;

pub fn deployment(input: &DeploymentInput<'_>) -> Deployment {
    let stack_type = input.key.stack_type;
    let profile = profile(stack_type);
    let (volumes, mounts) = split([data_volume(input, profile.data_path, None), home_volume(input, &profile)]);
    let container = Container {
        name: input.deployment_name.to_string(),
        image: Some(input.image.to_string()),
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
    use stacklab_core::{StackKey, StackType};

    fn key(t: StackType) -> StackKey {
        StackKey { project_key: "proj".into(), name: "nb".into(), stack_type: t }
    }

    #[test]
    fn container_is_named_after_the_deployment() {
        let k = key(StackType::JupyterLab);
        let input = DeploymentInput {
            key: &k,
            deployment_name: "jupyterlab-nb",
            service_name: "jupyterlab-nb",
            image: "img:1",
            volume_mount: Some("projectdata"),
            source_path: None,
            credential_secret: Some("jupyterlab-nb"),
            home_claim: Some("jupyterlab-nb-claim"),
        };
        let d = deployment(&input);
        assert_eq!(d.metadata.name.as_deref(), Some("jupyterlab-nb"));
        let spec = d.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        let pod = spec.template.spec.unwrap();
        let c = &pod.containers[0];
        assert_eq!(c.name, "jupyterlab-nb");
        assert_eq!(c.image.as_deref(), Some("img:1"));

        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes[0].name, "projectdata");
        assert_eq!(volumes[0].persistent_volume_claim.as_ref().unwrap().claim_name, "projectdata-claim");
        assert_eq!(volumes[1].persistent_volume_claim.as_ref().unwrap().claim_name, "jupyterlab-nb-claim");
        let mounts = c.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].mount_path, "/data");
        assert_eq!(mounts[1].mount_path, "/home/jovyan");

        let env = c.env.as_ref().unwrap();
        assert!(env.iter().any(|e| e.name == "JUPYTER_ENABLE_LAB"));
        let token = env.iter().find(|e| e.name == "JUPYTER_TOKEN").unwrap();
        let sel = token.value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!(sel.name.as_deref(), Some("jupyterlab-nb"));
        assert_eq!(sel.key, "token");
    }

    #[test]
    fn no_volumes_without_data_or_home() {
        let k = key(StackType::RStudio);
        let input = DeploymentInput {
            key: &k,
            deployment_name: "rstudio-nb",
            service_name: "rstudio-nb",
            image: "rocker/rstudio:4.3",
            volume_mount: None,
            source_path: None,
            credential_secret: None,
            home_claim: None,
        };
        let pod = deployment(&input).spec.unwrap().template.spec.unwrap();
        assert!(pod.volumes.is_none());
        assert!(pod.containers[0].volume_mounts.is_none());
        assert!(pod.containers[0].env.is_none());
    }
}
