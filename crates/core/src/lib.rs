//! Stacklab core types: stacks, stack types, naming and runtime configuration.

#![forbid(unsafe_code)]

pub mod config;
pub mod names;
pub mod repository;
mod stack;

pub use config::{CatalogueConfig, Config, DatalabInfo, HomeStorageConfig};
pub use repository::{AssetRepository, StackRepository, UserRecord};
pub use stack::{
    AssetMetadata, Category, Stack, StackKey, StackParams, StackRef, StackStatus, StackType,
    UnknownStackType, Visibility,
};

pub mod prelude {
    pub use super::{
        AssetMetadata, Category, Config, Stack, StackKey, StackParams, StackRef, StackStatus,
        StackType, UnknownStackType, Visibility,
    };
}

/// Seconds since the unix epoch.
pub fn now_ts() -> i64 {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    now.as_secs() as i64
}
