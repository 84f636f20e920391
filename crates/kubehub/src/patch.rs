//! Merge-patch bodies and their local application.

use chrono::{DateTime, Utc};
use serde_json::{json, Value as Json};

pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Rolling-restart trigger: touches only the pod template annotation.
pub fn restart_patch(at: DateTime<Utc>) -> Json {
    json!({
        "spec": {"template": {"metadata": {"annotations": {RESTARTED_AT_ANNOTATION: at.to_rfc3339()}}}}
    })
}

/// Add a `metadata.resourceVersion` precondition so the store rejects a stale write.
pub fn with_precondition(patch: &Json, resource_version: Option<&str>) -> Json {
    let mut body = patch.clone();
    if let (Some(rv), Some(obj)) = (resource_version, body.as_object_mut()) {
        let meta = obj.entry("metadata").or_insert_with(|| Json::Object(serde_json::Map::new()));
        if let Some(meta) = meta.as_object_mut() {
            meta.insert("resourceVersion".into(), Json::String(rv.to_string()));
        }
    }
    body
}

/// Apply a JSON merge patch (RFC 7386) in place: objects merge recursively,
/// `null` removes a key, everything else (arrays included) replaces.
pub fn apply_merge_patch(target: &mut Json, patch: &Json) {
    match patch {
        Json::Object(patch_obj) => {
            if !target.is_object() {
                *target = Json::Object(serde_json::Map::new());
            }
            if let Some(target_obj) = target.as_object_mut() {
                for (k, pv) in patch_obj {
                    if pv.is_null() {
                        target_obj.remove(k);
                    } else {
                        apply_merge_patch(target_obj.entry(k.clone()).or_insert(Json::Null), pv);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_patch_only_sets_template_annotation() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let p = restart_patch(at);
        assert_eq!(
            p,
            json!({"spec": {"template": {"metadata": {"annotations": {
                "kubectl.kubernetes.io/restartedAt": "2024-05-01T10:00:00+00:00"
            }}}}})
        );
    }

    #[test]
    fn precondition_is_injected_without_touching_spec() {
        let p = json!({"spec": {"replicas": 1}});
        let with = with_precondition(&p, Some("7"));
        assert_eq!(with, json!({"metadata": {"resourceVersion": "7"}, "spec": {"replicas": 1}}));
        assert_eq!(with_precondition(&p, None), p);
    }

    #[test]
    fn merge_patch_replaces_arrays_and_removes_nulls() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3], "gone": true});
        apply_merge_patch(&mut target, &json!({"a": {"c": 3}, "list": [9], "gone": null}));
        assert_eq!(target, json!({"a": {"b": 1, "c": 3}, "list": [9]}));
    }
}
