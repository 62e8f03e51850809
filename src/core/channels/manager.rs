use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{
    ChannelError, ChannelStatus, ChannelType, MessageDirection, UnifiedMessage,
    generate_webhook_secret, generate_webhook_url, validate_channel_config,
};
use crate::core::store::Store;
use crate::core::store::types::{AppChannelRecord, ChannelMessageRecord, ChannelRecord};
use crate::core::vault::CredentialVault;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub name: String,
    #[serde(default = "empty_config")]
    pub config: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChannel {
    pub name: Option<String>,
    pub status: Option<ChannelStatus>,
    pub config: Option<Value>,
}

/// Creation response: the only place the webhook secret is ever returned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChannel {
    #[serde(flatten)]
    pub channel: ChannelRecord,
    pub webhook_secret: String,
}

fn empty_config() -> Value {
    Value::Object(Map::new())
}

/// Owns channel lifecycle: creation, credential sealing, app links and the
/// inbound message log.
#[derive(Clone)]
pub struct ChannelManager {
    store: Store,
    vault: CredentialVault,
    base_url: String,
}

impl ChannelManager {
    pub fn new(store: Store, vault: CredentialVault, base_url: impl Into<String>) -> Self {
        Self {
            store,
            vault,
            base_url: base_url.into(),
        }
    }

    pub async fn create(
        &self,
        user_id: &str,
        request: CreateChannel,
    ) -> Result<CreatedChannel, ChannelError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ChannelError::NameRequired);
        }
        let validation = validate_channel_config(request.channel_type, &request.config);
        if !validation.valid {
            return Err(ChannelError::InvalidConfig(validation.errors));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let secret = generate_webhook_secret();
        let sealed = self.vault.seal_json(&request.config)?;

        self.store
            .insert_pending_channel(&id, user_id, request.channel_type, name, &secret, &sealed)
            .await?;
        let url = generate_webhook_url(&id, &self.base_url);
        self.store.backfill_webhook_url(&id, &url).await?;

        let channel = self
            .store
            .get_channel(&id)
            .await?
            .ok_or_else(|| ChannelError::NotFound(id.clone()))?;
        info!(
            "Created {} channel {} for user {}",
            channel.channel_type, channel.id, user_id
        );
        Ok(CreatedChannel {
            channel,
            webhook_secret: secret,
        })
    }

    /// Unscoped lookup, used by the public webhook receiver.
    pub async fn find(&self, id: &str) -> Result<Option<ChannelRecord>, ChannelError> {
        Ok(self.store.get_channel(id).await?)
    }

    /// A channel owned by `user_id`. Other users' channels read as missing.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<ChannelRecord, ChannelError> {
        match self.store.get_channel(id).await? {
            Some(channel) if channel.user_id == user_id => Ok(channel),
            _ => Err(ChannelError::NotFound(id.to_string())),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ChannelRecord>, ChannelError> {
        Ok(self.store.list_channels_for_user(user_id).await?)
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        request: UpdateChannel,
    ) -> Result<ChannelRecord, ChannelError> {
        let channel = self.get(user_id, id).await?;

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => return Err(ChannelError::NameRequired),
            other => other,
        };
        if request.status == Some(ChannelStatus::Pending) {
            return Err(ChannelError::InvalidStatus(ChannelStatus::Pending));
        }
        let sealed = match &request.config {
            Some(config) => {
                let validation = validate_channel_config(channel.channel_type, config);
                if !validation.valid {
                    return Err(ChannelError::InvalidConfig(validation.errors));
                }
                Some(self.vault.seal_json(config)?)
            }
            None => None,
        };

        self.store
            .update_channel_fields(id, name, request.status, sealed.as_deref())
            .await?;
        self.get(user_id, id).await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), ChannelError> {
        self.get(user_id, id).await?;
        self.store.delete_channel(id).await?;
        info!("Deleted channel {}", id);
        Ok(())
    }

    /// Decrypted platform config of a channel.
    pub fn credentials(&self, channel: &ChannelRecord) -> Result<Value, ChannelError> {
        Ok(self.vault.open_json(&channel.credentials)?)
    }

    pub async fn record_error(&self, id: &str, error: &str) {
        if let Err(e) = self.store.record_channel_error(id, error).await {
            warn!("Failed to record error on channel {}: {}", id, e);
        }
    }

    /// Store an inbound message and promote a CONFIGURING channel to ACTIVE.
    pub async fn record_inbound(
        &self,
        channel: &ChannelRecord,
        message: &UnifiedMessage,
    ) -> Result<ChannelMessageRecord, ChannelError> {
        let mut metadata = message.metadata.clone().unwrap_or_default();
        metadata.insert("senderId".to_string(), Value::String(message.sender_id.clone()));
        metadata.insert(
            "channelRef".to_string(),
            Value::String(message.channel_ref.clone()),
        );
        if let Some(ts) = &message.timestamp {
            metadata.insert("timestamp".to_string(), Value::String(ts.clone()));
        }

        let record = self
            .store
            .append_channel_message(
                &channel.id,
                MessageDirection::Inbound,
                &message.external_id,
                &message.content,
                &Value::Object(metadata),
            )
            .await?;

        if channel.status == ChannelStatus::Configuring
            && self
                .store
                .transition_channel_status(
                    &channel.id,
                    ChannelStatus::Configuring,
                    ChannelStatus::Active,
                )
                .await?
        {
            info!("Channel {} received its first message and is now ACTIVE", channel.id);
        }
        Ok(record)
    }

    pub async fn messages(
        &self,
        user_id: &str,
        id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessageRecord>, ChannelError> {
        self.get(user_id, id).await?;
        Ok(self.store.list_channel_messages(id, limit).await?)
    }

    async fn owned_app(&self, user_id: &str, app_id: &str) -> Result<(), ChannelError> {
        match self.store.get_generated_app(app_id).await? {
            Some(app) if app.user_id == user_id => Ok(()),
            _ => Err(ChannelError::AppNotFound(app_id.to_string())),
        }
    }

    pub async fn link_app(
        &self,
        user_id: &str,
        channel_id: &str,
        app_id: &str,
    ) -> Result<AppChannelRecord, ChannelError> {
        self.get(user_id, channel_id).await?;
        self.owned_app(user_id, app_id).await?;
        Ok(self.store.link_app_channel(app_id, channel_id).await?)
    }

    pub async fn set_app_enabled(
        &self,
        user_id: &str,
        channel_id: &str,
        app_id: &str,
        enabled: bool,
    ) -> Result<(), ChannelError> {
        self.get(user_id, channel_id).await?;
        if !self
            .store
            .set_app_channel_enabled(app_id, channel_id, enabled)
            .await?
        {
            return Err(ChannelError::AppNotFound(app_id.to_string()));
        }
        Ok(())
    }

    pub async fn unlink_app(
        &self,
        user_id: &str,
        channel_id: &str,
        app_id: &str,
    ) -> Result<(), ChannelError> {
        self.get(user_id, channel_id).await?;
        if !self.store.unlink_app_channel(app_id, channel_id).await? {
            return Err(ChannelError::AppNotFound(app_id.to_string()));
        }
        Ok(())
    }

    pub async fn app_links(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<Vec<AppChannelRecord>, ChannelError> {
        self.get(user_id, channel_id).await?;
        Ok(self.store.list_app_channels_for_channel(channel_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_store;
    use serde_json::json;

    fn manager() -> ChannelManager {
        ChannelManager::new(
            test_store(),
            CredentialVault::new("test-secret").unwrap(),
            "https://fhirbuilders.test/",
        )
    }

    fn telegram() -> CreateChannel {
        CreateChannel {
            channel_type: ChannelType::Telegram,
            name: "Clinic bot".to_string(),
            config: json!({ "botToken": "123:abc" }),
        }
    }

    #[tokio::test]
    async fn create_backfills_url_and_seals_credentials() {
        let manager = manager();
        let created = manager.create("u1", telegram()).await.unwrap();
        let channel = &created.channel;

        assert_eq!(channel.status, ChannelStatus::Configuring);
        assert_eq!(
            channel.webhook_url,
            format!("https://fhirbuilders.test/api/openclaw/webhook/{}", channel.id)
        );
        assert_eq!(created.webhook_secret.len(), 64);
        assert!(!channel.credentials.contains("123:abc"));
        assert_eq!(manager.credentials(channel).unwrap(), json!({ "botToken": "123:abc" }));

        let body = serde_json::to_value(&created).unwrap();
        assert_eq!(body["webhookSecret"], created.webhook_secret);
        assert!(body.get("credentials").is_none());

        let listed = serde_json::to_value(manager.list("u1").await.unwrap()).unwrap();
        assert!(listed[0].get("webhookSecret").is_none());
        assert!(listed[0].get("credentials").is_none());
    }

    #[tokio::test]
    async fn create_rejects_invalid_config() {
        let manager = manager();
        let err = manager
            .create(
                "u1",
                CreateChannel {
                    channel_type: ChannelType::Slack,
                    name: "Team".to_string(),
                    config: json!({}),
                },
            )
            .await
            .unwrap_err();
        match err {
            ChannelError::InvalidConfig(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(manager.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_users_channels_are_not_found() {
        let manager = manager();
        let created = manager.create("u1", telegram()).await.unwrap();
        assert!(matches!(
            manager.get("u2", &created.channel.id).await,
            Err(ChannelError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete("u2", &created.channel.id).await,
            Err(ChannelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_revalidates_config_and_refuses_pending() {
        let manager = manager();
        let id = manager.create("u1", telegram()).await.unwrap().channel.id;

        let err = manager
            .update(
                "u1",
                &id,
                UpdateChannel {
                    config: Some(json!({ "botToken": "" })),
                    ..UpdateChannel::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidConfig(_)));

        let err = manager
            .update(
                "u1",
                &id,
                UpdateChannel {
                    status: Some(ChannelStatus::Pending),
                    ..UpdateChannel::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidStatus(_)));

        let updated = manager
            .update(
                "u1",
                &id,
                UpdateChannel {
                    name: Some("Renamed".to_string()),
                    status: Some(ChannelStatus::Paused),
                    config: Some(json!({ "botToken": "456:def" })),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.status, ChannelStatus::Paused);
        assert_eq!(manager.credentials(&updated).unwrap()["botToken"], "456:def");
    }

    #[tokio::test]
    async fn first_inbound_message_activates_channel() {
        let manager = manager();
        let channel = manager.create("u1", telegram()).await.unwrap().channel;
        let message = UnifiedMessage {
            content: "hi".to_string(),
            sender_id: "777".to_string(),
            channel_ref: "-100".to_string(),
            external_id: "42".to_string(),
            timestamp: Some("1700000000".to_string()),
            metadata: None,
        };

        let stored = manager.record_inbound(&channel, &message).await.unwrap();
        assert_eq!(stored.direction, MessageDirection::Inbound);
        assert_eq!(stored.metadata["senderId"], "777");
        assert_eq!(stored.metadata["channelRef"], "-100");

        let reloaded = manager.get("u1", &channel.id).await.unwrap();
        assert_eq!(reloaded.status, ChannelStatus::Active);
        assert_eq!(manager.messages("u1", &channel.id, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn app_links_respect_ownership() {
        let store = test_store();
        let manager = ChannelManager::new(
            store.clone(),
            CredentialVault::new("test-secret").unwrap(),
            "http://localhost:3000",
        );
        let channel = manager.create("u1", telegram()).await.unwrap().channel;
        let app = store
            .create_generated_app("A portal for patients to view labs", "u1", &["Patient".to_string()], None)
            .await
            .unwrap();
        let foreign = store
            .create_generated_app("Someone else's generated portal", "u2", &["Patient".to_string()], None)
            .await
            .unwrap();

        assert!(manager.link_app("u1", &channel.id, &app.id).await.unwrap().enabled);
        assert!(matches!(
            manager.link_app("u1", &channel.id, &foreign.id).await,
            Err(ChannelError::AppNotFound(_))
        ));

        manager
            .set_app_enabled("u1", &channel.id, &app.id, false)
            .await
            .unwrap();
        assert!(!manager.app_links("u1", &channel.id).await.unwrap()[0].enabled);

        manager.unlink_app("u1", &channel.id, &app.id).await.unwrap();
        assert!(matches!(
            manager.unlink_app("u1", &channel.id, &app.id).await,
            Err(ChannelError::AppNotFound(_))
        ));
    }
}
