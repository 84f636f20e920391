//! Stacklab apply: asset mount diffs against live deployments, plus dry-run summaries.

#![forbid(unsafe_code)]

use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use stacklab_kubehub::patch::apply_merge_patch;

mod mounts;

pub use mounts::{asset_mounts, plan_asset_mount, AssetMounts, MountPlan};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary { pub adds: usize, pub updates: usize, pub removes: usize }

impl DiffSummary {
    pub fn is_empty(&self) -> bool { self.adds == 0 && self.updates == 0 && self.removes == 0 }
}

/// What a mount would do to a deployment, without submitting anything.
#[derive(Debug, Clone, Serialize)]
pub struct MountPreview {
    pub deployment: String,
    pub volumes_before: Vec<String>,
    pub volumes_after: Vec<String>,
    pub unresolved: Vec<String>,
    pub summary: DiffSummary,
    pub patch: Json,
}

/// Apply `plan` to a copy of `current` and summarise the difference.
pub fn preview(current: &Deployment, plan: &MountPlan, mounts: &AssetMounts) -> Result<MountPreview, serde_json::Error> {
    let live = strip_noisy(serde_json::to_value(current)?);
    let patch = plan.patch_body();
    let mut target = live.clone();
    apply_merge_patch(&mut target, &patch);
    let volumes_before = current
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.volumes.as_ref())
        .map(|vs| vs.iter().map(|v| v.name.clone()).collect())
        .unwrap_or_default();
    Ok(MountPreview {
        deployment: current.metadata.name.clone().unwrap_or_default(),
        volumes_before,
        volumes_after: plan.volume_names().into_iter().map(String::from).collect(),
        unresolved: mounts.unresolved.clone(),
        summary: diff_summary(&target, &live),
        patch,
    })
}

/// Drop server-populated fields that should never count as a difference.
pub fn strip_noisy(mut v: Json) -> Json {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
            obj.remove("resourceVersion");
            obj.remove("generation");
            obj.remove("creationTimestamp");
        }
    }
    if let Some(obj) = v.as_object_mut() { obj.remove("status"); }
    v
}

pub fn diff_summary(target: &Json, base: &Json) -> DiffSummary {
    fn walk(a: &Json, b: &Json, adds: &mut usize, ups: &mut usize, rems: &mut usize) {
        use serde_json::Value as V;
        match (a, b) {
            (V::Object(ao), V::Object(bo)) => {
                for (k, av) in ao.iter() {
                    if let Some(bv) = bo.get(k) {
                        if av == bv { continue; }
                        walk(av, bv, adds, ups, rems);
                    } else {
                        *adds += 1;
                    }
                }
                for (k, _bv) in bo.iter() {
                    if !ao.contains_key(k) { *rems += 1; }
                }
            }
            (V::Array(aa), V::Array(bb)) => {
                let min_len = aa.len().min(bb.len());
                for i in 0..min_len { if aa[i] != bb[i] { walk(&aa[i], &bb[i], adds, ups, rems); } }
                if aa.len() > bb.len() { *adds += aa.len() - bb.len(); }
                if bb.len() > aa.len() { *rems += bb.len() - aa.len(); }
            }
            (av, bv) => { if av != bv { *ups += 1; } }
        }
    }
    let mut adds = 0usize; let mut ups = 0usize; let mut rems = 0usize;
    walk(target, base, &mut adds, &mut ups, &mut rems);
    DiffSummary { adds, updates: ups, removes: rems }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, Volume};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use stacklab_core::{AssetMetadata, CatalogueConfig};

    #[test]
    fn strip_noisy_prunes_common_fields() {
        let v = serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "x",
                "namespace": "ns",
                "managedFields": [ {"foo": "bar"} ],
                "resourceVersion": "123",
                "generation": 5,
                "creationTimestamp": "2020-01-01T00:00:00Z"
            },
            "status": { "replicas": 1 },
            "spec": { "replicas": 1 }
        });
        let pruned = strip_noisy(v);
        let meta = pruned.get("metadata").unwrap().as_object().unwrap();
        assert!(!meta.contains_key("managedFields"));
        assert!(!meta.contains_key("resourceVersion"));
        assert!(!meta.contains_key("generation"));
        assert!(!meta.contains_key("creationTimestamp"));
        assert!(!pruned.as_object().unwrap().contains_key("status"));
    }

    #[test]
    fn diff_summary_counts_adds_updates_removes() {
        let base = serde_json::json!({ "a": 1, "b": { "x": 1 }, "c": [1, 2, 3] });
        let target = serde_json::json!({ "a": 2, "b": { "x": 1, "y": 2 }, "c": [1, 9], "d": true });
        let s = diff_summary(&target, &base);
        assert_eq!(s, DiffSummary { adds: 2, updates: 2, removes: 1 });
    }

    fn deployment(volumes: &[&str]) -> Deployment {
        Deployment {
            metadata: ObjectMeta { name: Some("jupyter-nb".into()), resource_version: Some("7".into()), ..Default::default() },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        volumes: Some(volumes.iter().map(|n| Volume { name: n.to_string(), ..Default::default() }).collect()),
                        containers: vec![Container { name: "jupyter-nb".into(), ..Default::default() }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn preview_reports_volume_sets_and_unresolved_ids() {
        let catalogue = CatalogueConfig { server: "nfs".into(), file_location: "/data/assets".into(), mount_root: "/assets".into() };
        let meta = vec![AssetMetadata { asset_id: "a1".into(), file_location: "census".into() }];
        let mounts = asset_mounts(&["a1".to_string(), "gone".to_string()], &meta, &catalogue);
        let current = deployment(&["persistentfsvol", "asset-old"]);
        let plan = plan_asset_mount(&current, "jupyter-nb", &mounts);
        let p = preview(&current, &plan, &mounts).unwrap();
        assert_eq!(p.deployment, "jupyter-nb");
        assert_eq!(p.volumes_before, vec!["persistentfsvol", "asset-old"]);
        assert_eq!(p.volumes_after, vec!["persistentfsvol", "asset-a1"]);
        assert_eq!(p.unresolved, vec!["gone"]);
        assert!(!p.summary.is_empty());
    }

    #[test]
    fn preview_of_current_state_is_empty() {
        let catalogue = CatalogueConfig { server: "nfs".into(), file_location: "/data/assets".into(), mount_root: "/assets".into() };
        let current = deployment(&["persistentfsvol"]);
        let mounts = asset_mounts(&[], &[], &catalogue);
        let plan = plan_asset_mount(&current, "jupyter-nb", &mounts);
        let p = preview(&current, &plan, &mounts).unwrap();
        assert!(p.summary.is_empty(), "summary={:?}", p.summary);
    }
}
