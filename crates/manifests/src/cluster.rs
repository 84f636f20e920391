//! Compute cluster stacks: a scheduler deployment plus a worker deployment.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use stacklab_core::names::worker_deployment_name;
use stacklab_core::StackType;

use crate::common::{container_ports, data_volume, env, plain_env, some_if_any, split};
use crate::profile::profile;
use crate::DeploymentInput;

const WORKER_REPLICAS: i32 = 2;

pub fn scheduler(input: &DeploymentInput<'_>) -> Deployment {
    let stack_type = input.key.stack_type;
    let profile = profile(stack_type);
    let (volumes, mounts) = split([data_volume(input, profile.data_path, None)]);
    let command = match stack_type {
        StackType::Dask => Some(vec!["dask-scheduler".to_string()]),
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

/// Workers reach the scheduler through the stack service's second port.
pub fn workers(input: &DeploymentInput<'_>) -> Deployment {
    let stack_type = input.key.stack_type;
    let profile = profile(stack_type);
    let name = worker_deployment_name(input.deployment_name);
    let scheduler_port = profile.ports.get(1).map(|p| p.port).unwrap_or(profile.ports[0].port);
    let (command, env) = match stack_type {
        StackType::Dask => (
            Some(vec!["dask-worker".to_string(), format!("tcp://{}:{}", input.service_name, scheduler_port)]),
            Vec::new(),
        ),
        _ => {
            let master = format!("spark://{}:{}", input.service_name, scheduler_port);
            (None, plain_env(&[("SPARK_MODE", "worker"), ("SPARK_MASTER_URL", master.as_str())]))
        }
    };
    let (volumes, mounts) = split([data_volume(input, profile.data_path, None)]);
    let container = Container {
        name: name.clone(),
        image: Some(input.image.to_string()),
        command,
        env: some_if_any(env),
        volume_mounts: some_if_any(mounts),
        ..Default::default()
    };
    crate::common::deployment(&name, stack_type, WORKER_REPLICAS, container, volumes)
}
