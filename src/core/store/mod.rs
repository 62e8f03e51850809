mod app_channels;
mod channels;
mod generations;
mod messages;
mod tokens;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::lifecycle::LifecycleComponent;
use crate::platform::{NativePlatform, Platform};

pub const DATABASE_FILE: &str = "fhirbuilders.db";

/// SQLite-backed persistence for generation jobs, messaging channels, the
/// channel message log, app/channel links and API tokens.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).await?;
        }
        NativePlatform::restrict_dir_permissions(&data_dir);

        let db_path = data_dir.join(DATABASE_FILE);
        let db = Connection::open(&db_path)?;
        NativePlatform::restrict_file_permissions(&db_path);
        init_schema(&db)?;

        info!("Store opened at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        init_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

fn init_schema(db: &Connection) -> Result<()> {
    db.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS generated_apps (
            id TEXT PRIMARY KEY,
            prompt TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            fhir_resources TEXT NOT NULL,
            template_id TEXT,
            generated_code TEXT,
            github_repo_url TEXT,
            sandbox_url TEXT,
            medplum_project_id TEXT,
            error_message TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_generated_apps_user_created
            ON generated_apps(user_id, created_at);

        CREATE TABLE IF NOT EXISTS messaging_channels (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            channel_type TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            webhook_url TEXT NOT NULL DEFAULT '',
            webhook_secret TEXT NOT NULL,
            credentials TEXT NOT NULL,
            last_error TEXT,
            last_error_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_messaging_channels_user
            ON messaging_channels(user_id, created_at);

        CREATE TABLE IF NOT EXISTS channel_messages (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL REFERENCES messaging_channels(id) ON DELETE CASCADE,
            direction TEXT NOT NULL,
            external_id TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_channel_messages_channel
            ON channel_messages(channel_id, created_at);

        CREATE TABLE IF NOT EXISTS app_channels (
            app_id TEXT NOT NULL REFERENCES generated_apps(id) ON DELETE CASCADE,
            channel_id TEXT NOT NULL REFERENCES messaging_channels(id) ON DELETE CASCADE,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (app_id, channel_id)
        );

        CREATE TABLE IF NOT EXISTS api_tokens (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

/// Map a JSON text column into `T`, surfacing decode failures as row errors.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn enum_column<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unexpected value '{}'", raw).into(),
        )
    })
}

/// Create an in-memory Store for testing.
#[cfg(test)]
pub fn test_store() -> Store {
    Store::open_in_memory().expect("open in-memory store")
}

#[async_trait]
impl LifecycleComponent for Store {
    async fn on_init(&mut self) -> Result<()> {
        info!("Store (SQLite) initializing...");
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("Store shutting down...");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let store = Store::open(&data_dir).await.unwrap();
        assert!(data_dir.join(DATABASE_FILE).exists());
        assert!(store.list_generated_apps_for_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path()).await.unwrap();
            store
                .create_generated_app("a prompt long enough to pass", "u1", &["Patient".to_string()], None)
                .await
                .unwrap();
        }
        let store = Store::open(dir.path()).await.unwrap();
        assert_eq!(store.list_generated_apps_for_user("u1").await.unwrap().len(), 1);
    }
}
