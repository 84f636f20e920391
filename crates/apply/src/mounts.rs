//! Asset mount diff: rewrite a deployment's asset volumes and the stack
//! container's asset mounts to exactly the requested set.

use std::collections::HashSet;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, NFSVolumeSource, Volume, VolumeMount};
use serde_json::{json, Value as Json};
use stacklab_core::names::{asset_volume, is_asset_volume};
use stacklab_core::{AssetMetadata, CatalogueConfig};
use tracing::{debug, warn};

/// Volumes and mounts for the requested assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMounts {
    pub volumes: Vec<Volume>,
    pub volume_mounts: Vec<VolumeMount>,
    /// Requested ids without metadata; left out of the mount set.
    pub unresolved: Vec<String>,
}

fn join_path(root: &str, rel: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), rel.trim_start_matches('/'))
}

/// Build the asset mount set. Order follows `requested` (first occurrence wins),
/// independent of the order metadata was returned in.
pub fn asset_mounts(requested: &[String], metadata: &[AssetMetadata], catalogue: &CatalogueConfig) -> AssetMounts {
    let mut out = AssetMounts::default();
    let mut seen = HashSet::new();
    for id in requested {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let Some(meta) = metadata.iter().find(|m| &m.asset_id == id) else {
            debug!(asset_id = %id, "no metadata for asset; not mounting");
            out.unresolved.push(id.clone());
            continue;
        };
        let name = asset_volume(id);
        out.volumes.push(Volume {
            name: name.clone(),
            nfs: Some(NFSVolumeSource {
                server: catalogue.server.clone(),
                path: join_path(&catalogue.file_location, &meta.file_location),
                read_only: Some(true),
            }),
            ..Default::default()
        });
        out.volume_mounts.push(VolumeMount {
            name,
            mount_path: join_path(&catalogue.mount_root, &meta.file_location),
            read_only: Some(true),
            ..Default::default()
        });
    }
    out
}

/// Full replacement lists for the pod template; merge patches replace lists wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct MountPlan {
    pub volumes: Vec<Volume>,
    pub containers: Vec<Container>,
}

/// Compute the pod template lists that carry exactly `mounts` as asset volumes.
/// Non-asset volumes and mounts keep their order; only the container named
/// `container_name` has its mounts rewritten.
pub fn plan_asset_mount(current: &Deployment, container_name: &str, mounts: &AssetMounts) -> MountPlan {
    let pod = current.spec.as_ref().and_then(|s| s.template.spec.as_ref());

    let mut volumes: Vec<Volume> = pod
        .and_then(|p| p.volumes.as_ref())
        .map(|vs| vs.iter().filter(|v| !is_asset_volume(&v.name)).cloned().collect())
        .unwrap_or_default();
    volumes.extend(mounts.volumes.iter().cloned());

    let mut matched = false;
    let containers: Vec<Container> = pod
        .map(|p| p.containers.clone())
        .unwrap_or_default()
        .into_iter()
        .map(|mut c| {
            if c.name == container_name {
                matched = true;
                let had_mounts = c.volume_mounts.is_some();
                let mut vm: Vec<VolumeMount> = c
                    .volume_mounts
                    .take()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|m| !is_asset_volume(&m.name))
                    .collect();
                vm.extend(mounts.volume_mounts.iter().cloned());
                c.volume_mounts = if vm.is_empty() && !had_mounts { None } else { Some(vm) };
            }
            c
        })
        .collect();
    if !matched {
        warn!(container = %container_name, "no container matches the deployment name; mounts unchanged");
    }

    MountPlan { volumes, containers }
}

impl MountPlan {
    /// Merge-patch body replacing the pod template's volumes and containers.
    pub fn patch_body(&self) -> Json {
        json!({
            "spec": {"template": {"spec": {
                "volumes": self.volumes,
                "containers": self.containers,
            }}}
        })
    }

    /// The volume names the plan leaves on the pod, in order.
    pub fn volume_names(&self) -> Vec<&str> {
        self.volumes.iter().map(|v| v.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use stacklab_kubehub::patch::apply_merge_patch;

    const DEPLOYMENT: &str = "jupyterlab-teststack";
    const TEST_VOLUME: &str = "test-volume";

    fn catalogue() -> CatalogueConfig {
        CatalogueConfig { server: "127.0.0.1".into(), file_location: "/test/assets/".into(), mount_root: "/assets".into() }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn metadata_for(v: &[&str]) -> Vec<AssetMetadata> {
        v.iter().map(|id| AssetMetadata { asset_id: id.to_string(), file_location: format!("asset_{}", id) }).collect()
    }

    fn current_deployment(initial: &[&str]) -> Deployment {
        let asset_volumes: Vec<Volume> =
            initial.iter().map(|id| Volume { name: format!("asset-{}-initial", id), ..Default::default() }).collect();
        let asset_mounts: Vec<VolumeMount> = initial
            .iter()
            .map(|id| VolumeMount { name: format!("asset-{}-initial", id), mount_path: format!("/assets/{}", id), ..Default::default() })
            .collect();
        let mut volumes = vec![Volume {
            name: TEST_VOLUME.into(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource { claim_name: "test-volume-claim".into(), read_only: None }),
            ..Default::default()
        }];
        volumes.extend(asset_volumes);
        let mut mounts = vec![VolumeMount { name: TEST_VOLUME.into(), mount_path: "/data".into(), ..Default::default() }];
        mounts.extend(asset_mounts);
        Deployment {
            metadata: ObjectMeta { name: Some(DEPLOYMENT.into()), ..Default::default() },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        volumes: Some(volumes),
                        containers: vec![
                            Container { name: DEPLOYMENT.into(), volume_mounts: Some(mounts), ..Default::default() },
                            Container { name: "supporting-container".into(), ..Default::default() },
                        ],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn plan(initial: &[&str], desired: &[&str]) -> MountPlan {
        let mounts = asset_mounts(&ids(desired), &metadata_for(desired), &catalogue());
        plan_asset_mount(&current_deployment(initial), DEPLOYMENT, &mounts)
    }

    fn mount_names(plan: &MountPlan, container: &str) -> Vec<String> {
        plan.containers
            .iter()
            .find(|c| c.name == container)
            .and_then(|c| c.volume_mounts.as_ref())
            .map(|m| m.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn adds_assets_when_none_are_mounted() {
        let p = plan(&[], &["0001", "0002", "0003"]);
        assert_eq!(p.volume_names(), vec![TEST_VOLUME, "asset-0001", "asset-0002", "asset-0003"]);
        assert_eq!(mount_names(&p, DEPLOYMENT), vec![TEST_VOLUME, "asset-0001", "asset-0002", "asset-0003"]);
        // pre-existing data volume untouched
        assert_eq!(p.volumes[0].persistent_volume_claim.as_ref().unwrap().claim_name, "test-volume-claim");
        let nfs = p.volumes[1].nfs.as_ref().unwrap();
        assert_eq!(nfs.server, "127.0.0.1");
        assert_eq!(nfs.path, "/test/assets/asset_0001");
        assert_eq!(nfs.read_only, Some(true));
        let data_mount = &p.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(data_mount.mount_path, "/data");
        assert_eq!(p.containers[0].volume_mounts.as_ref().unwrap()[1].mount_path, "/assets/asset_0001");
    }

    #[test]
    fn replaces_mounted_assets_with_requested_set() {
        let p = plan(&["0001", "0002", "0003"], &["0002", "0005"]);
        assert_eq!(p.volume_names(), vec![TEST_VOLUME, "asset-0002", "asset-0005"]);
        assert_eq!(mount_names(&p, DEPLOYMENT), vec![TEST_VOLUME, "asset-0002", "asset-0005"]);
    }

    #[test]
    fn removes_all_assets_when_none_requested() {
        let p = plan(&["0001", "0002", "0003"], &[]);
        assert_eq!(p.volume_names(), vec![TEST_VOLUME]);
        assert_eq!(mount_names(&p, DEPLOYMENT), vec![TEST_VOLUME]);
        assert_eq!(p.containers.len(), 2);
        assert_eq!(p.containers[1], Container { name: "supporting-container".into(), ..Default::default() });
    }

    #[test]
    fn unresolved_assets_are_dropped() {
        let mounts = asset_mounts(&ids(&["0001", "9999"]), &metadata_for(&["0001"]), &catalogue());
        assert_eq!(mounts.unresolved, vec!["9999".to_string()]);
        let p = plan_asset_mount(&current_deployment(&[]), DEPLOYMENT, &mounts);
        assert_eq!(p.volume_names(), vec![TEST_VOLUME, "asset-0001"]);
    }

    #[test]
    fn order_follows_request_not_metadata() {
        let mut meta = metadata_for(&["0003", "0001"]);
        meta.reverse();
        let mounts = asset_mounts(&ids(&["0003", "0001", "0003"]), &meta, &catalogue());
        let names: Vec<_> = mounts.volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["asset-0003", "asset-0001"]);
    }

    #[test]
    fn applying_the_plan_twice_is_a_no_op() {
        let desired = ["0002", "0005"];
        let mounts = asset_mounts(&ids(&desired), &metadata_for(&desired), &catalogue());
        let first = plan_asset_mount(&current_deployment(&["0001"]), DEPLOYMENT, &mounts);

        let mut doc = serde_json::to_value(current_deployment(&["0001"])).unwrap();
        apply_merge_patch(&mut doc, &first.patch_body());
        let once: Deployment = serde_json::from_value(doc.clone()).unwrap();

        let second = plan_asset_mount(&once, DEPLOYMENT, &mounts);
        assert_eq!(first.patch_body(), second.patch_body());
        apply_merge_patch(&mut doc, &second.patch_body());
        let twice: Deployment = serde_json::from_value(doc).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unmatched_container_keeps_its_mounts() {
        let mounts = asset_mounts(&ids(&["0001"]), &metadata_for(&["0001"]), &catalogue());
        let p = plan_asset_mount(&current_deployment(&[]), "someone-else", &mounts);
        assert_eq!(mount_names(&p, DEPLOYMENT), vec![TEST_VOLUME]);
        assert_eq!(p.volume_names(), vec![TEST_VOLUME, "asset-0001"]);
    }
}
