// Discord-side enforcement - implements the moderation gateway over the
// serenity HTTP client. Every call maps a platform error into an
// EnforcementError; deciding whether that failure matters is the engine's
// business.

use crate::core::automod::{EnforcementError, ModerationGateway};
use async_trait::async_trait;
use serenity::all::{ChannelId, EditMember, GuildId, MessageId, Timestamp, UserId};
use serenity::http::Http;
use std::sync::Arc;
use std::time::Duration;

pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ModerationGateway for SerenityGateway {
    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), EnforcementError> {
        self.http
            .delete_message(
                ChannelId::new(channel_id),
                MessageId::new(message_id),
                Some("automod"),
            )
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Duration,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        let until = Timestamp::from_unix_timestamp(
            chrono::Utc::now().timestamp() + duration.as_secs() as i64,
        )
        .map_err(|e| EnforcementError::Platform(e.to_string()))?;

        GuildId::new(guild_id)
            .edit_member(
                &self.http,
                UserId::new(user_id),
                EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(reason),
            )
            .await
            .map(|_| ())
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }

    async fn kick_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        GuildId::new(guild_id)
            .kick_with_reason(&self.http, UserId::new(user_id), reason)
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }

    async fn ban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        GuildId::new(guild_id)
            .ban_with_reason(&self.http, UserId::new(user_id), 0, reason)
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }

    async fn notify_user(&self, user_id: u64, message: &str) -> Result<(), EnforcementError> {
        let channel = UserId::new(user_id)
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))?;
        channel
            .id
            .say(&self.http, message)
            .await
            .map(|_| ())
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }
}
