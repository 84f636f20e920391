//! Canonical names of every cluster resource a stack owns.
//!
//! All functions are pure: a resource name is always recomputed from the
//! stack identity and never stored alongside it.

use crate::StackType;

const ASSET_VOLUME_PREFIX: &str = "asset-";

pub fn deployment_name(name: &str, stack_type: StackType) -> String {
    format!("{}-{}", stack_type, name)
}

pub fn service_name(name: &str, stack_type: StackType) -> String {
    deployment_name(name, stack_type)
}

pub fn ingress_name(name: &str, stack_type: StackType) -> String {
    deployment_name(name, stack_type)
}

pub fn stack_credential_secret(name: &str, stack_type: StackType) -> String {
    deployment_name(name, stack_type)
}

pub fn network_policy_name(name: &str, stack_type: StackType) -> String {
    format!("{}-{}-netpol", stack_type, name)
}

pub fn autoscaler_name(name: &str, stack_type: StackType) -> String {
    format!("{}-{}-hpa", stack_type, name)
}

pub fn pvc_name(volume_name: &str) -> String {
    format!("{}-claim", volume_name)
}

pub fn asset_volume(asset_id: &str) -> String {
    format!("{}{}", ASSET_VOLUME_PREFIX, asset_id)
}

pub fn is_asset_volume(volume_name: &str) -> bool {
    volume_name.starts_with(ASSET_VOLUME_PREFIX)
}

pub fn worker_deployment_name(deployment_name: &str) -> String {
    format!("{}-worker", deployment_name)
}

// Project namespaces

pub fn project_namespace(project_key: &str) -> String {
    project_key.to_string()
}

pub fn project_compute_namespace(project_key: &str) -> String {
    format!("{}-compute", project_key)
}

// Compute submission

pub fn compute_submission_service_account(project_key: &str) -> String {
    format!("{}-compute-submission-account", project_key)
}

pub fn compute_submission_role_binding(project_key: &str) -> String {
    format!("{}-role-binding", compute_submission_service_account(project_key))
}

pub fn compute_submission_cluster_role() -> &'static str {
    "compute-submission-role"
}

// Spark

pub fn pyspark_config_map(deployment_name: &str) -> String {
    format!("{}-pyspark-config", deployment_name)
}

pub fn spark_driver_headless_service(service_name: &str) -> String {
    format!("{}-spark-driver-headless-service", service_name)
}

pub fn spark_job(deployment_name: &str) -> String {
    format!("{}-spark-job", deployment_name)
}

// Dask

pub fn dask_config_map(deployment_name: &str) -> String {
    format!("{}-dask-config", deployment_name)
}

pub fn scheduler_pod_label(name: &str) -> String {
    format!("scheduler-{}-po", name)
}

/// Path of a stack's credentials in the secret store.
pub fn secret_path(datalab: &str, id: &str) -> String {
    format!("{}/notebooks/{}", datalab, id)
}

/// Public host a stack is served on.
pub fn stack_host(project_key: &str, name: &str, domain: &str) -> String {
    format!("{}-{}.{}", project_key, name, domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_name_is_type_dash_name_for_every_type() {
        for t in StackType::ALL {
            assert_eq!(deployment_name("expectedName", t), format!("{}-expectedName", t.as_str()));
            // repeated calls give identical results
            assert_eq!(deployment_name("expectedName", t), deployment_name("expectedName", t));
        }
    }

    #[test]
    fn derived_names_share_the_deployment_stem() {
        let t = StackType::Jupyter;
        assert_eq!(service_name("nb", t), "jupyter-nb");
        assert_eq!(ingress_name("nb", t), "jupyter-nb");
        assert_eq!(stack_credential_secret("nb", t), "jupyter-nb");
        assert_eq!(network_policy_name("nb", t), "jupyter-nb-netpol");
        assert_eq!(autoscaler_name("nb", t), "jupyter-nb-hpa");
        assert_eq!(pvc_name("jupyter-nb"), "jupyter-nb-claim");
    }

    #[test]
    fn asset_volume_names_are_recognised() {
        assert_eq!(asset_volume("0001"), "asset-0001");
        assert!(is_asset_volume(&asset_volume("0001")));
        assert!(is_asset_volume("asset-0001-initial"));
        assert!(!is_asset_volume("test-volume"));
        assert!(!is_asset_volume("my-asset-0001"));
    }

    #[test]
    fn project_and_compute_names() {
        assert_eq!(project_namespace("proj"), "proj");
        assert_eq!(project_compute_namespace("proj"), "proj-compute");
        assert_eq!(compute_submission_service_account("proj"), "proj-compute-submission-account");
        assert_eq!(compute_submission_role_binding("proj"), "proj-compute-submission-account-role-binding");
        assert_eq!(compute_submission_cluster_role(), "compute-submission-role");
    }

    #[test]
    fn cluster_names() {
        assert_eq!(pyspark_config_map("spark-c"), "spark-c-pyspark-config");
        assert_eq!(dask_config_map("dask-c"), "dask-c-dask-config");
        assert_eq!(spark_driver_headless_service("spark-c"), "spark-c-spark-driver-headless-service");
        assert_eq!(spark_job("spark-c"), "spark-c-spark-job");
        assert_eq!(scheduler_pod_label("c"), "scheduler-c-po");
        assert_eq!(worker_deployment_name("dask-c"), "dask-c-worker");
    }

    #[test]
    fn secret_path_and_host() {
        assert_eq!(secret_path("testlab", "jupyter-nb"), "testlab/notebooks/jupyter-nb");
        assert_eq!(stack_host("proj", "nb", "datalabs.localhost"), "proj-nb.datalabs.localhost");
    }
}
