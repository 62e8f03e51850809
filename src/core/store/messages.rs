use anyhow::Result;
use rusqlite::{Row, params};

use super::types::ChannelMessageRecord;
use super::{Store, enum_column, json_column};
use crate::core::channels::MessageDirection;

const MESSAGE_COLUMNS: &str =
    "id, channel_id, direction, external_id, content, metadata, created_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelMessageRecord> {
    let direction: String = row.get(2)?;
    let metadata: String = row.get(5)?;
    Ok(ChannelMessageRecord {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        direction: enum_column(2, &direction, MessageDirection::from_direction)?,
        external_id: row.get(3)?,
        content: row.get(4)?,
        metadata: json_column(5, &metadata)?,
        created_at: row.get(6)?,
    })
}

impl Store {
    pub async fn append_channel_message(
        &self,
        channel_id: &str,
        direction: MessageDirection,
        external_id: &str,
        content: &str,
        metadata: &serde_json::Value,
    ) -> Result<ChannelMessageRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(metadata)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO channel_messages (id, channel_id, direction, external_id, content, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                channel_id,
                direction.as_str(),
                external_id,
                content,
                metadata_json
            ],
        )?;
        let record = db.query_row(
            &format!("SELECT {} FROM channel_messages WHERE id = ?1", MESSAGE_COLUMNS),
            params![id],
            message_from_row,
        )?;
        Ok(record)
    }

    /// Most recent messages of a channel, newest first.
    pub async fn list_channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessageRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM channel_messages WHERE channel_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![channel_id, limit as i64], message_from_row)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}
