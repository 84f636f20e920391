use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::names;

/// Raised when a stack type key does not name a supported stack type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stack type: {0}")]
pub struct UnknownStackType(pub String);

/// Supported stack types. The key (`Display`/`FromStr`) is what callers send
/// and what prefixes every derived resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackType {
    Jupyter,
    JupyterLab,
    Zeppelin,
    RStudio,
    RShiny,
    NbViewer,
    Spark,
    Dask,
}

impl StackType {
    pub const ALL: [StackType; 8] = [
        StackType::Jupyter,
        StackType::JupyterLab,
        StackType::Zeppelin,
        StackType::RStudio,
        StackType::RShiny,
        StackType::NbViewer,
        StackType::Spark,
        StackType::Dask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StackType::Jupyter => "jupyter",
            StackType::JupyterLab => "jupyterlab",
            StackType::Zeppelin => "zeppelin",
            StackType::RStudio => "rstudio",
            StackType::RShiny => "rshiny",
            StackType::NbViewer => "nbviewer",
            StackType::Spark => "spark",
            StackType::Dask => "dask",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            StackType::Jupyter | StackType::JupyterLab | StackType::Zeppelin | StackType::RStudio => Category::Analysis,
            StackType::RShiny | StackType::NbViewer => Category::Publish,
            StackType::Spark | StackType::Dask => Category::Cluster,
        }
    }
}

impl fmt::Display for StackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackType {
    type Err = UnknownStackType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StackType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownStackType(s.to_string()))
    }
}

/// Coarse classification used for listing and permission grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Analysis,
    Publish,
    Cluster,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Analysis => "ANALYSIS",
            Category::Publish => "PUBLISH",
            Category::Cluster => "CLUSTER",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    #[default]
    Requested,
    Creating,
    Ready,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Private,
    Project,
    Public,
}

/// Unresolved reference to a stack as callers send it. The type key is kept
/// raw so the registry decides whether it is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackRef {
    pub project_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stack_type: String,
}

impl StackRef {
    pub fn new(project_key: impl Into<String>, name: impl Into<String>, stack_type: impl Into<String>) -> Self {
        Self { project_key: project_key.into(), name: name.into(), stack_type: stack_type.into() }
    }

    pub fn resolve(&self) -> Result<StackKey, UnknownStackType> {
        let stack_type = self.stack_type.parse::<StackType>()?;
        Ok(StackKey { project_key: self.project_key.clone(), name: self.name.clone(), stack_type })
    }
}

/// Resolved stack identity. Resource names are always derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackKey {
    pub project_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stack_type: StackType,
}

impl StackKey {
    pub fn deployment_name(&self) -> String {
        names::deployment_name(&self.name, self.stack_type)
    }

    pub fn namespace(&self) -> String {
        names::project_namespace(&self.project_key)
    }
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_key, names::deployment_name(&self.name, self.stack_type))
    }
}

/// Create request for a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackParams {
    pub project_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stack_type: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Shared data volume to mount at `/data`.
    pub volume_mount: Option<String>,
    /// Content path served by publishing stacks.
    pub source_path: Option<String>,
    pub asset_ids: Vec<String>,
    pub visible: Visibility,
}

impl StackParams {
    pub fn stack_ref(&self) -> StackRef {
        StackRef::new(&self.project_key, &self.name, &self.stack_type)
    }
}

/// Persisted stack record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub project_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stack_type: StackType,
    pub category: Category,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub internal_endpoint: Option<String>,
    pub volume_mount: Option<String>,
    #[serde(default)]
    pub asset_ids: Vec<String>,
    pub status: StackStatus,
    pub visible: Visibility,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub users: Vec<String>,
    pub created: i64,
    pub updated: i64,
}

impl Stack {
    pub fn key(&self) -> StackKey {
        StackKey { project_key: self.project_key.clone(), name: self.name.clone(), stack_type: self.stack_type }
    }
}

/// Storage location of a centrally managed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub asset_id: String,
    pub file_location: String,
}
