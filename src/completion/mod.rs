//! Chat-completion service boundary.
//!
//! Provides the [`CompletionService`] trait, the request/message types shared by
//! every caller, and an OpenAI-compatible HTTP implementation created via
//! [`create_service`] from configuration.

pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::memory::types::{Role, Turn};

/// Role of a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// Plain text, or a list of parts for multimodal (image) requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, text)
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(parts),
        }
    }

    fn plain(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    /// The text of a plain-text message, `None` for multimodal content.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(_) => None,
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            content: MessageContent::Text(turn.content.clone()),
        }
    }
}

/// A single chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Why a completion call produced no text.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("no API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("rate limited or quota exhausted: {body}")]
    RateLimited { body: String },
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("service returned an empty completion")]
    Empty,
}

/// Something that turns a message list into generated text.
///
/// Implementations must be cheap to share behind an `Arc`; one call is one
/// network round-trip with no retries.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier, for logs and diagnostics.
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Create a completion service from config.
///
/// Currently only `"openai"` (and OpenAI-compatible endpoints via `base_url`) is supported.
pub fn create_service(
    config: &crate::config::CompletionConfig,
) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "openai" => {
            let client = openai::OpenAiClient::from_config(config)?;
            Ok(Arc::new(client))
        }
        other => anyhow::bail!("unknown completion provider: {other}. Supported: openai"),
    }
}
