//! Messaging platform collaborator
//!
//! Webhook payload types and the client used to reply to users and look up
//! their profiles. Only LINE is supported.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const LINE_API_BASE: &str = "https://api.line.me";

// ============================================================================
// Webhook payload
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    /// Stable across redeliveries of the same event
    pub webhook_event_id: Option<String>,
    pub source: Option<WebhookSource>,
    pub message: Option<WebhookMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

/// A text message from a user, as handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub text: String,
    pub reply_token: String,
    pub delivery_id: Option<String>,
}

impl WebhookEvent {
    /// The text message carried by this event; other event kinds yield `None`
    pub fn into_inbound(self) -> Option<InboundMessage> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message?;
        if message.kind != "text" {
            return None;
        }
        Some(InboundMessage {
            sender_id: self.source?.user_id?,
            text: message.text?,
            reply_token: self.reply_token?,
            delivery_id: self.webhook_event_id,
        })
    }
}

// ============================================================================
// Outbound messages
// ============================================================================

/// A message sent back to the user
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Pre-rendered platform message (the event ticket)
    Ticket(Value),
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text(text.into())
    }

    fn to_line_message(&self) -> Value {
        match self {
            Outbound::Text(text) => json!({ "type": "text", "text": text }),
            Outbound::Ticket(payload) => payload.clone(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Transport(String),
    #[error("platform returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Answer an inbound message; a reply token can be used once
    async fn reply(&self, reply_token: &str, messages: &[Outbound]) -> Result<(), PlatformError>;

    /// The user's display name from their profile
    async fn display_name(&self, user_id: &str) -> Result<String, PlatformError>;
}

#[async_trait]
impl<T: PlatformClient + ?Sized> PlatformClient for Arc<T> {
    async fn reply(&self, reply_token: &str, messages: &[Outbound]) -> Result<(), PlatformError> {
        (**self).reply(reply_token, messages).await
    }

    async fn display_name(&self, user_id: &str) -> Result<String, PlatformError> {
        (**self).display_name(user_id).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    display_name: String,
}

/// LINE Messaging API client
pub struct LinePlatformClient {
    client: Client,
    channel_token: String,
    api_base: String,
}

impl LinePlatformClient {
    pub fn new(channel_token: String, api_base: &str) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PlatformError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            channel_token,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<String, PlatformError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Transport(format!("Failed to read response: {e}")))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(PlatformError::Api { status, body })
        }
    }
}

#[async_trait]
impl PlatformClient for LinePlatformClient {
    async fn reply(&self, reply_token: &str, messages: &[Outbound]) -> Result<(), PlatformError> {
        let request = ReplyRequest {
            reply_token,
            messages: messages.iter().map(Outbound::to_line_message).collect(),
        };

        let response = self
            .client
            .post(format!("{}/v2/bot/message/reply", self.api_base))
            .bearer_auth(&self.channel_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn display_name(&self, user_id: &str) -> Result<String, PlatformError> {
        let response = self
            .client
            .get(format!("{}/v2/bot/profile/{user_id}", self.api_base))
            .bearer_auth(&self.channel_token)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let body = Self::check(response).await?;
        let profile: Profile = serde_json::from_str(&body)
            .map_err(|e| PlatformError::Transport(format!("Failed to parse profile: {e}")))?;
        Ok(profile.display_name)
    }
}

/// Client used when no channel token is configured: replies only go to the log
pub struct LoggingPlatformClient;

#[async_trait]
impl PlatformClient for LoggingPlatformClient {
    async fn reply(&self, reply_token: &str, messages: &[Outbound]) -> Result<(), PlatformError> {
        for message in messages {
            match message {
                Outbound::Text(text) => {
                    tracing::info!(reply_token = %reply_token, text = %text, "Reply");
                }
                Outbound::Ticket(payload) => {
                    tracing::info!(reply_token = %reply_token, payload = %payload, "Reply ticket");
                }
            }
        }
        Ok(())
    }

    async fn display_name(&self, user_id: &str) -> Result<String, PlatformError> {
        Ok(user_id.to_string())
    }
}
