//! Collaborator contracts the orchestrator persists through.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{AssetMetadata, Stack, StackKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub stacks: usize,
}

/// Document store for stack records.
#[async_trait::async_trait]
pub trait StackRepository: Send + Sync {
    async fn create_or_update(&self, user: &str, stack: &Stack) -> Result<()>;

    /// Remove the record; removing an absent record is not an error.
    async fn delete_stack(&self, user: &str, key: &StackKey) -> Result<()>;

    async fn find(&self, key: &StackKey) -> Result<Option<Stack>>;

    async fn list(&self, project_key: &str) -> Result<Vec<Stack>>;

    /// Users owning at least one stack.
    async fn users(&self) -> Result<Vec<UserRecord>>;

    async fn user(&self, user_id: &str) -> Result<Option<UserRecord>>;
}

/// Batched asset metadata lookup. Result order is not guaranteed to follow `ids`,
/// and ids without metadata are simply absent.
#[async_trait::async_trait]
pub trait AssetRepository: Send + Sync {
    async fn get_metadata_with_ids(&self, ids: &[String]) -> Result<Vec<AssetMetadata>>;
}
