//! Discord REST client.
//!
//! Two calls are needed: editing the original response of a deferred
//! interaction, and posting a message to the alert channel with the bot
//! token. Both go through one `reqwest` client with a bounded timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::alert::dispatcher::AlertSink;
use crate::chat::handler::ReplyChannel;
use crate::config::DiscordConfig;
use crate::error::PlatformError;

/// Discord rejects message content beyond this many characters.
const MAX_CONTENT_CHARS: usize = 2000;

pub struct DiscordClient {
    client: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig, timeout: Duration) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Network(format!("could not build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn check(response: reqwest::Response) -> Result<(), PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Trims content to the platform limit on a character boundary.
pub fn clamp_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let mut clamped: String = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
    clamped.push('…');
    clamped
}

#[async_trait]
impl ReplyChannel for DiscordClient {
    async fn edit_reply(&self, interaction_token: &str, content: &str) -> Result<(), PlatformError> {
        let application_id = self.config.application_id.as_deref().ok_or_else(|| {
            PlatformError::Network("DISCORD_APPLICATION_ID is not configured".to_string())
        })?;

        let url = format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.config.api_base, application_id, interaction_token
        );
        let response = self
            .client
            .patch(&url)
            .json(&json!({ "content": clamp_content(content) }))
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Self::check(response).await
    }
}

#[async_trait]
impl AlertSink for DiscordClient {
    async fn broadcast(&self, message: &str) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/messages",
            self.config.api_base, self.config.alert_channel_id
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.config.token))
            .json(&json!({
                "content": clamp_content(message),
                "allowed_mentions": { "parse": ["everyone"] },
            }))
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Self::check(response).await
    }
}
