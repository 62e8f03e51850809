use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};

use super::Store;
use super::types::ApiTokenRecord;

pub const TOKEN_PREFIX: &str = "fbk_";

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_raw_token() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

impl Store {
    /// Issue a token for `user_id`. The raw token is returned once and only
    /// its hash is stored.
    pub async fn create_api_token(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<(String, ApiTokenRecord)> {
        let raw_token = generate_raw_token();
        let token_hash = hash_token(&raw_token);
        let id = uuid::Uuid::new_v4().to_string();

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO api_tokens (id, user_id, name, token_hash) VALUES (?1, ?2, ?3, ?4)",
            params![id, user_id, name, token_hash],
        )?;

        let created_at = db.query_row(
            "SELECT created_at FROM api_tokens WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )?;

        Ok((
            raw_token,
            ApiTokenRecord {
                id,
                user_id: user_id.to_string(),
                name: name.to_string(),
                created_at,
            },
        ))
    }

    pub async fn list_api_tokens(&self) -> Result<Vec<ApiTokenRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, name, created_at FROM api_tokens ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ApiTokenRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(row?);
        }
        Ok(tokens)
    }

    pub async fn delete_api_token(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM api_tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Resolve a raw bearer token to the user it was issued for.
    pub async fn resolve_api_token(&self, raw_token: &str) -> Result<Option<String>> {
        let token_hash = hash_token(raw_token);
        let db = self.db.lock().await;
        let user_id = db
            .query_row(
                "SELECT user_id FROM api_tokens WHERE token_hash = ?1",
                params![token_hash],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    #[tokio::test]
    async fn token_format_and_resolution() {
        let store = test_store();
        let (raw, record) = store.create_api_token("u1", "laptop").await.unwrap();
        assert!(raw.starts_with(TOKEN_PREFIX));
        assert_eq!(raw.len(), TOKEN_PREFIX.len() + 32);
        assert_eq!(record.user_id, "u1");

        assert_eq!(store.resolve_api_token(&raw).await.unwrap().as_deref(), Some("u1"));
        assert_eq!(store.resolve_api_token("fbk_nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoked_token_no_longer_resolves() {
        let store = test_store();
        let (raw, record) = store.create_api_token("u1", "ci").await.unwrap();
        assert_eq!(store.list_api_tokens().await.unwrap().len(), 1);
        assert!(store.delete_api_token(&record.id).await.unwrap());
        assert!(store.resolve_api_token(&raw).await.unwrap().is_none());
        assert!(store.list_api_tokens().await.unwrap().is_empty());
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = hash_token("fbk_abc");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, "fbk_abc");
    }
}
