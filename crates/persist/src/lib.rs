//! Stacklab persistence: SQLite store for stack records and asset metadata.
//! Synchronous under the hood; callers are not latency sensitive.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use metrics::{counter, histogram};
use rusqlite::{params, params_from_iter, OptionalExtension};
use stacklab_core::{AssetMetadata, AssetRepository, Stack, StackKey, StackRepository, UserRecord};
use tracing::debug;

pub struct SqliteStore {
    db: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open `STACKLAB_DB_PATH`, or `~/.stacklab/stacklab.db`.
    pub fn open_default() -> Result<Self> {
        let path = std::env::var("STACKLAB_DB_PATH").unwrap_or_else(|_| default_db_path());
        Self::open(&path)
    }

    pub fn open(path: &str) -> Result<Self> {
        let started = Instant::now();
        let db = rusqlite::Connection::open(path).with_context(|| format!("opening sqlite db at {}", path))?;
        db.pragma_update(None, "journal_mode", "WAL").ok();
        db.pragma_update(None, "synchronous", "NORMAL").ok();
        db.execute(
            "CREATE TABLE IF NOT EXISTS stacks (
                project_key TEXT NOT NULL,
                name        TEXT NOT NULL,
                type        TEXT NOT NULL,
                owner       TEXT NOT NULL,
                doc         TEXT NOT NULL,
                created     INTEGER NOT NULL,
                updated     INTEGER NOT NULL,
                PRIMARY KEY (project_key, name, type)
            )",
            [],
        )
        .context("creating stacks table")?;
        db.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                asset_id      TEXT PRIMARY KEY,
                file_location TEXT NOT NULL
            )",
            [],
        )
        .context("creating assets table")?;
        db.execute("CREATE INDEX IF NOT EXISTS idx_stacks_owner ON stacks(owner)", []).ok();
        let me = Self { db: Mutex::new(db) };
        histogram!("persist_open_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(me)
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.db.lock().map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    /// Register or move an asset's storage location.
    pub fn put_asset(&self, asset: &AssetMetadata) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO assets(asset_id, file_location) VALUES (?1, ?2)
             ON CONFLICT(asset_id) DO UPDATE SET file_location = excluded.file_location",
            params![asset.asset_id, asset.file_location],
        )
        .with_context(|| format!("saving asset {}", asset.asset_id))?;
        Ok(())
    }

    fn user_counts(&self, owner: Option<&str>) -> Result<Vec<UserRecord>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT owner, COUNT(*) FROM stacks WHERE ?1 IS NULL OR owner = ?1 GROUP BY owner ORDER BY owner",
        )?;
        let rows = stmt.query_map([owner], |row| {
            let user_id: String = row.get(0)?;
            let stacks: i64 = row.get(1)?;
            Ok(UserRecord { user_id, stacks: stacks as usize })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn parse_doc(doc: &str) -> Result<Stack> {
    serde_json::from_str(doc).context("decoding stack record")
}

#[async_trait::async_trait]
impl StackRepository for SqliteStore {
    async fn create_or_update(&self, user: &str, stack: &Stack) -> Result<()> {
        let started = Instant::now();
        let doc = serde_json::to_string(stack).context("encoding stack record")?;
        let db = self.conn()?;
        // the first writer stays the owner
        db.execute(
            "INSERT INTO stacks(project_key, name, type, owner, doc, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(project_key, name, type) DO UPDATE SET doc = excluded.doc, updated = excluded.updated",
            params![
                stack.project_key,
                stack.name,
                stack.stack_type.as_str(),
                user,
                doc,
                stack.created,
                stack.updated
            ],
        )
        .with_context(|| format!("saving stack {}", stack.key()))?;
        histogram!("persist_put_ms", started.elapsed().as_secs_f64() * 1000.0);
        counter!("persist_put_total", 1u64);
        Ok(())
    }

    async fn delete_stack(&self, user: &str, key: &StackKey) -> Result<()> {
        let db = self.conn()?;
        let n = db
            .execute(
                "DELETE FROM stacks WHERE project_key = ?1 AND name = ?2 AND type = ?3",
                params![key.project_key, key.name, key.stack_type.as_str()],
            )
            .with_context(|| format!("deleting stack {}", key))?;
        debug!(stack = %key, user = %user, removed = n, "stack record deleted");
        Ok(())
    }

    async fn find(&self, key: &StackKey) -> Result<Option<Stack>> {
        let started = Instant::now();
        let db = self.conn()?;
        let doc: Option<String> = db
            .query_row(
                "SELECT doc FROM stacks WHERE project_key = ?1 AND name = ?2 AND type = ?3",
                params![key.project_key, key.name, key.stack_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        histogram!("persist_get_ms", started.elapsed().as_secs_f64() * 1000.0);
        doc.as_deref().map(parse_doc).transpose()
    }

    async fn list(&self, project_key: &str) -> Result<Vec<Stack>> {
        let db = self.conn()?;
        let mut stmt = db.prepare("SELECT doc FROM stacks WHERE project_key = ?1 ORDER BY type, name")?;
        let docs = stmt.query_map([project_key], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for doc in docs {
            out.push(parse_doc(&doc?)?);
        }
        Ok(out)
    }

    async fn users(&self) -> Result<Vec<UserRecord>> {
        self.user_counts(None)
    }

    async fn user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.user_counts(Some(user_id))?.into_iter().next())
    }
}

#[async_trait::async_trait]
impl AssetRepository for SqliteStore {
    async fn get_metadata_with_ids(&self, ids: &[String]) -> Result<Vec<AssetMetadata>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let db = self.conn()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT asset_id, file_location FROM assets WHERE asset_id IN ({})", placeholders);
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok(AssetMetadata { asset_id: row.get(0)?, file_location: row.get(1)? })
        })?;
        let out = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        histogram!("persist_get_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(out)
    }
}

fn default_db_path() -> String {
    if let Some(home) = std::env::var_os("HOME") {
        let mut p = std::path::PathBuf::from(home);
        p.push(".stacklab");
        let _ = std::fs::create_dir_all(&p);
        p.push("stacklab.db");
        return p.to_string_lossy().to_string();
    }
    "stacklab.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacklab_core::{Category, StackStatus, StackType, Visibility};

    fn temp_db() -> String {
        let dir = std::env::temp_dir();
        let f = format!("stacklab-test-{}.db", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos());
        dir.join(f).to_string_lossy().to_string()
    }

    fn stack(name: &str, stack_type: StackType) -> Stack {
        Stack {
            project_key: "proj".into(),
            name: name.into(),
            stack_type,
            category: stack_type.category(),
            display_name: Some(name.to_uppercase()),
            description: None,
            url: None,
            internal_endpoint: None,
            volume_mount: Some("projectdata".into()),
            asset_ids: vec!["a1".into()],
            status: StackStatus::Requested,
            visible: Visibility::Project,
            shared: false,
            users: vec!["alice".into()],
            created: 10,
            updated: 10,
        }
    }

    #[tokio::test]
    async fn save_find_update_delete() {
        let s = SqliteStore::open(&temp_db()).unwrap();
        let mut nb = stack("nb", StackType::Jupyter);
        s.create_or_update("alice", &nb).await.unwrap();
        assert_eq!(s.find(&nb.key()).await.unwrap(), Some(nb.clone()));

        nb.status = StackStatus::Creating;
        nb.updated = 20;
        s.create_or_update("bob", &nb).await.unwrap();
        let found = s.find(&nb.key()).await.unwrap().unwrap();
        assert_eq!(found.status, StackStatus::Creating);
        assert_eq!(found.category, Category::Analysis);
        // ownership stays with the creator
        assert_eq!(s.user("alice").await.unwrap().unwrap().stacks, 1);
        assert!(s.user("bob").await.unwrap().is_none());

        s.delete_stack("alice", &nb.key()).await.unwrap();
        assert!(s.find(&nb.key()).await.unwrap().is_none());
        s.delete_stack("alice", &nb.key()).await.unwrap();
    }

    #[tokio::test]
    async fn list_and_users() {
        let s = SqliteStore::open(&temp_db()).unwrap();
        s.create_or_update("alice", &stack("nb", StackType::Jupyter)).await.unwrap();
        s.create_or_update("alice", &stack("nb", StackType::RStudio)).await.unwrap();
        s.create_or_update("carol", &stack("app", StackType::RShiny)).await.unwrap();
        let listed = s.list("proj").await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(s.list("other").await.unwrap().is_empty());
        let users = s.users().await.unwrap();
        assert_eq!(
            users,
            vec![
                UserRecord { user_id: "alice".into(), stacks: 2 },
                UserRecord { user_id: "carol".into(), stacks: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn asset_lookup_skips_unknown_ids() {
        let s = SqliteStore::open(&temp_db()).unwrap();
        s.put_asset(&AssetMetadata { asset_id: "a1".into(), file_location: "census".into() }).unwrap();
        s.put_asset(&AssetMetadata { asset_id: "a2".into(), file_location: "old".into() }).unwrap();
        s.put_asset(&AssetMetadata { asset_id: "a2".into(), file_location: "weather".into() }).unwrap();
        let mut found = s.get_metadata_with_ids(&["a2".into(), "nope".into(), "a1".into()]).await.unwrap();
        found.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        assert_eq!(
            found,
            vec![
                AssetMetadata { asset_id: "a1".into(), file_location: "census".into() },
                AssetMetadata { asset_id: "a2".into(), file_location: "weather".into() },
            ]
        );
        assert!(s.get_metadata_with_ids(&[]).await.unwrap().is_empty());
    }
}
