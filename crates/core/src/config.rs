//! Runtime configuration, read from `STACKLAB_*` environment variables.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::StackType;

/// Identity of the datalab instance stacks are created in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatalabInfo {
    pub name: String,
    pub domain: String,
}

/// NFS export serving centrally managed assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueConfig {
    pub server: String,
    pub file_location: String,
    /// Directory inside stack containers that assets are mounted under.
    pub mount_root: String,
}

/// Per-stack home claim sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeStorageConfig {
    pub storage_class: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub datalab: DatalabInfo,
    pub catalogue: CatalogueConfig,
    pub home_storage: HomeStorageConfig,
    pub secret_namespace: String,
    /// `None` serves every known stack type.
    pub enabled_types: Option<Vec<StackType>>,
    pub images: BTreeMap<StackType, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datalab: DatalabInfo { name: "testlab".into(), domain: "datalabs.localhost".into() },
            catalogue: CatalogueConfig {
                server: "127.0.0.1".into(),
                file_location: "/assets".into(),
                mount_root: "/assets".into(),
            },
            home_storage: HomeStorageConfig { storage_class: "standard".into(), size: "1Gi".into() },
            secret_namespace: "stacklab-secrets".into(),
            enabled_types: None,
            images: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = v;
            }
        };
        set(&mut cfg.datalab.name, "STACKLAB_DATALAB_NAME");
        set(&mut cfg.datalab.domain, "STACKLAB_DATALAB_DOMAIN");
        set(&mut cfg.catalogue.server, "STACKLAB_CATALOGUE_SERVER");
        set(&mut cfg.catalogue.file_location, "STACKLAB_CATALOGUE_FILE_LOCATION");
        set(&mut cfg.catalogue.mount_root, "STACKLAB_ASSET_MOUNT_ROOT");
        set(&mut cfg.home_storage.storage_class, "STACKLAB_HOME_STORAGE_CLASS");
        set(&mut cfg.home_storage.size, "STACKLAB_HOME_STORAGE_SIZE");
        set(&mut cfg.secret_namespace, "STACKLAB_SECRET_NAMESPACE");

        if let Some(raw) = lookup("STACKLAB_ENABLED_TYPES").filter(|v| !v.trim().is_empty()) {
            let types = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<StackType>())
                .collect::<Result<Vec<_>, _>>()
                .context("parsing STACKLAB_ENABLED_TYPES")?;
            cfg.enabled_types = Some(types);
        }

        for t in StackType::ALL {
            let key = format!("STACKLAB_IMAGE_{}", t.as_str().to_ascii_uppercase());
            if let Some(image) = lookup(&key).filter(|v| !v.trim().is_empty()) {
                cfg.images.insert(t, image);
            }
        }
        Ok(cfg)
    }

    pub fn image_override(&self, stack_type: StackType) -> Option<&str> {
        self.images.get(&stack_type).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.datalab.name, "testlab");
        assert!(cfg.enabled_types.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = Config::from_lookup(lookup(&[
            ("STACKLAB_DATALAB_NAME", "ceh"),
            ("STACKLAB_CATALOGUE_SERVER", "10.0.0.5"),
            ("STACKLAB_ENABLED_TYPES", "jupyter, rstudio"),
            ("STACKLAB_IMAGE_JUPYTERLAB", "example/lab:2"),
        ]))
        .unwrap();
        assert_eq!(cfg.datalab.name, "ceh");
        assert_eq!(cfg.catalogue.server, "10.0.0.5");
        assert_eq!(cfg.enabled_types, Some(vec![StackType::Jupyter, StackType::RStudio]));
        assert_eq!(cfg.image_override(StackType::JupyterLab), Some("example/lab:2"));
        assert_eq!(cfg.image_override(StackType::Jupyter), None);
    }

    #[test]
    fn invalid_enabled_type_is_rejected() {
        let err = Config::from_lookup(lookup(&[("STACKLAB_ENABLED_TYPES", "jupyter,notebook")])).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown stack type: notebook"), "err={:#}", err);
    }
}
