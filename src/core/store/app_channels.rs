use anyhow::Result;
use rusqlite::{Row, params};

use super::Store;
use super::types::AppChannelRecord;

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<AppChannelRecord> {
    Ok(AppChannelRecord {
        app_id: row.get(0)?,
        channel_id: row.get(1)?,
        enabled: row.get::<_, i32>(2)? != 0,
        created_at: row.get(3)?,
    })
}

impl Store {
    /// Link an app to a channel. Linking an existing pair re-enables it.
    pub async fn link_app_channel(&self, app_id: &str, channel_id: &str) -> Result<AppChannelRecord> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO app_channels (app_id, channel_id, enabled) VALUES (?1, ?2, 1)
             ON CONFLICT(app_id, channel_id) DO UPDATE SET enabled = 1",
            params![app_id, channel_id],
        )?;
        let record = db.query_row(
            "SELECT app_id, channel_id, enabled, created_at FROM app_channels
             WHERE app_id = ?1 AND channel_id = ?2",
            params![app_id, channel_id],
            link_from_row,
        )?;
        Ok(record)
    }

    pub async fn set_app_channel_enabled(
        &self,
        app_id: &str,
        channel_id: &str,
        enabled: bool,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE app_channels SET enabled = ?1 WHERE app_id = ?2 AND channel_id = ?3",
            params![enabled as i32, app_id, channel_id],
        )?;
        Ok(rows > 0)
    }

    pub async fn unlink_app_channel(&self, app_id: &str, channel_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM app_channels WHERE app_id = ?1 AND channel_id = ?2",
            params![app_id, channel_id],
        )?;
        Ok(rows > 0)
    }

    pub async fn list_app_channels_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Vec<AppChannelRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT app_id, channel_id, enabled, created_at FROM app_channels
             WHERE channel_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![channel_id], link_from_row)?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }
}
