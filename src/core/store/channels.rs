use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

use super::types::ChannelRecord;
use super::{Store, enum_column};
use crate::core::channels::{ChannelStatus, ChannelType};

const CHANNEL_COLUMNS: &str = "id, user_id, channel_type, name, status, webhook_url, \
     webhook_secret, credentials, last_error, last_error_at, created_at, updated_at";

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelRecord> {
    let channel_type: String = row.get(2)?;
    let status: String = row.get(4)?;
    Ok(ChannelRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_type: enum_column(2, &channel_type, ChannelType::from_type)?,
        name: row.get(3)?,
        status: enum_column(4, &status, ChannelStatus::from_status)?,
        webhook_url: row.get(5)?,
        webhook_secret: row.get(6)?,
        credentials: row.get(7)?,
        last_error: row.get(8)?,
        last_error_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl Store {
    /// First phase of channel creation: the row exists in PENDING with no
    /// webhook URL yet.
    pub async fn insert_pending_channel(
        &self,
        id: &str,
        user_id: &str,
        channel_type: ChannelType,
        name: &str,
        webhook_secret: &str,
        sealed_credentials: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO messaging_channels
                (id, user_id, channel_type, name, status, webhook_url, webhook_secret, credentials)
             VALUES (?1, ?2, ?3, ?4, ?5, '', ?6, ?7)",
            params![
                id,
                user_id,
                channel_type.as_str(),
                name,
                ChannelStatus::Pending.as_str(),
                webhook_secret,
                sealed_credentials
            ],
        )?;
        Ok(())
    }

    /// Second phase: set the webhook URL and move PENDING -> CONFIGURING.
    /// Re-running it on a channel that already left PENDING changes nothing.
    pub async fn backfill_webhook_url(&self, id: &str, webhook_url: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE messaging_channels
             SET webhook_url = ?1, status = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3 AND status = ?4",
            params![
                webhook_url,
                ChannelStatus::Configuring.as_str(),
                id,
                ChannelStatus::Pending.as_str()
            ],
        )?;
        Ok(rows > 0)
    }

    pub async fn get_channel(&self, id: &str) -> Result<Option<ChannelRecord>> {
        let db = self.db.lock().await;
        let record = db
            .query_row(
                &format!(
                    "SELECT {} FROM messaging_channels WHERE id = ?1",
                    CHANNEL_COLUMNS
                ),
                params![id],
                channel_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub async fn list_channels_for_user(&self, user_id: &str) -> Result<Vec<ChannelRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM messaging_channels WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
            CHANNEL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], channel_from_row)?;
        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }

    pub async fn update_channel_fields(
        &self,
        id: &str,
        name: Option<&str>,
        status: Option<ChannelStatus>,
        sealed_credentials: Option<&str>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE messaging_channels SET
                name = COALESCE(?1, name),
                status = COALESCE(?2, status),
                credentials = COALESCE(?3, credentials),
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?4",
            params![name, status.map(|s| s.as_str()), sealed_credentials, id],
        )?;
        Ok(rows > 0)
    }

    /// Move a channel from `from` to `to`; false when it was not in `from`.
    pub async fn transition_channel_status(
        &self,
        id: &str,
        from: ChannelStatus,
        to: ChannelStatus,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE messaging_channels SET status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2 AND status = ?3",
            params![to.as_str(), id, from.as_str()],
        )?;
        Ok(rows > 0)
    }

    pub async fn record_channel_error(&self, id: &str, error: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE messaging_channels
             SET last_error = ?1, last_error_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2",
            params![error, id],
        )?;
        Ok(())
    }

    pub async fn delete_channel(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM messaging_channels WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
