use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret};
use serde_json::json;
use stacklab_core::{HomeStorageConfig, StackType};

use crate::common::{labels, meta};
use crate::GeneratorError;

/// Opaque secret holding a stack's credentials as string data.
pub fn secret(name: &str, stack_type: StackType, data: &BTreeMap<String, String>) -> Secret {
    Secret {
        metadata: meta(name, labels(name, stack_type)),
        type_: Some("Opaque".to_string()),
        string_data: Some(data.clone()),
        ..Default::default()
    }
}

/// ReadWriteOnce claim sized from the home storage config.
pub fn claim(name: &str, stack_type: StackType, storage: &HomeStorageConfig) -> Result<PersistentVolumeClaim, GeneratorError> {
    let mut pvc: PersistentVolumeClaim = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "spec": {
            "accessModes": ["ReadWriteOnce"],
            "storageClassName": storage.storage_class,
            "resources": {"requests": {"storage": storage.size}},
        }
    }))
    .map_err(|source| GeneratorError::Encoding { kind: "persistent volume claim", source })?;
    pvc.metadata = meta(name, labels(name, stack_type));
    Ok(pvc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_carries_class_and_size() {
        let storage = HomeStorageConfig { storage_class: "glusterfs".into(), size: "5Gi".into() };
        let pvc = claim("jupyter-nb-claim", StackType::Jupyter, &storage).unwrap();
        assert_eq!(pvc.metadata.name.as_deref(), Some("jupyter-nb-claim"));
        let v = serde_json::to_value(&pvc).unwrap();
        assert_eq!(v["spec"]["storageClassName"], "glusterfs");
        assert_eq!(v["spec"]["resources"]["requests"]["storage"], "5Gi");
        assert_eq!(v["spec"]["accessModes"][0], "ReadWriteOnce");
    }

    #[test]
    fn secret_is_opaque_string_data() {
        let data = BTreeMap::from([("token".to_string(), "abc".to_string())]);
        let s = secret("jupyter-nb", StackType::Jupyter, &data);
        assert_eq!(s.type_.as_deref(), Some("Opaque"));
        assert_eq!(s.string_data.unwrap().get("token").map(String::as_str), Some("abc"));
    }
}
