//! Twilio-style WhatsApp webhook.
//!
//! Inbound messages arrive as form posts and are answered synchronously with a
//! TwiML document. Every POST gets HTTP 200, failures included; errors are
//! reported to the sender as an apology message.

pub mod chunk;
pub mod twiml;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::FormRejection, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tracing::Instrument;

use crate::akira::Akira;
use crate::config::AkiraConfig;
use crate::media::MediaMode;
use chunk::split_for_channel;
use twiml::MessagingResponse;

pub const BANNER: &str = "Akira WhatsApp Bot ON";
pub const WEBHOOK_ALIVE: &str = "WhatsApp webhook vivo (usa POST desde Twilio)";

/// Fields of an inbound message post. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: String,
    /// Kept as text and parsed leniently; a garbled count means no media.
    #[serde(rename = "NumMedia")]
    pub num_media: String,
    #[serde(rename = "MediaUrl0")]
    pub media_url: Option<String>,
    #[serde(rename = "MediaContentType0")]
    pub media_content_type: String,
}

impl InboundMessage {
    pub fn media_count(&self) -> u32 {
        self.num_media.trim().parse().unwrap_or(0)
    }
}

/// Credentials and limits for the media download and reply formatting.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub max_reply_chars: usize,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub download_timeout: Duration,
}

impl ChannelSettings {
    pub fn from_config(config: &AkiraConfig) -> Self {
        Self {
            max_reply_chars: config.media.max_reply_chars,
            account_sid: config.media.twilio_account_sid.clone(),
            auth_token: config.media.twilio_auth_token.clone(),
            download_timeout: config.media.download_timeout(),
        }
    }
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub akira: Arc<Akira>,
    pub http: reqwest::Client,
    pub channel: ChannelSettings,
}

impl WebhookState {
    pub fn new(akira: Arc<Akira>, channel: ChannelSettings) -> Self {
        Self {
            akira,
            http: reqwest::Client::new(),
            channel,
        }
    }

    async fn handle(&self, message: InboundMessage) -> Result<String> {
        let media = message.media_count();
        tracing::info!(
            from = %message.from,
            chars = message.body.chars().count(),
            media,
            "inbound message"
        );

        if media > 0 {
            // Only the first attachment is handled.
            let url = message
                .media_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .context("NumMedia > 0 but MediaUrl0 is missing")?;
            let data = self.download(url).await?;
            let mode = MediaMode::from_caption(&message.body);
            return Ok(self
                .akira
                .reply_to_media(&message.media_content_type, data, mode)
                .await);
        }

        Ok(self.akira.reply(&message.from, &message.body).await?)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.http.get(url).timeout(self.channel.download_timeout);
        if let Some(sid) = &self.channel.account_sid {
            request = request.basic_auth(sid, self.channel.auth_token.as_deref());
        }

        let response = request
            .send()
            .await
            .context("media download failed")?
            .error_for_status()
            .context("media download rejected")?;
        let bytes = response
            .bytes()
            .await
            .context("media download interrupted")?;

        tracing::debug!(bytes = bytes.len(), "media downloaded");
        Ok(bytes.to_vec())
    }
}

/// Create the webhook router
pub fn router(state: Arc<WebhookState>, webhook_path: &str) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/healthz", get(health_check))
        .route(webhook_path, get(webhook_alive).post(inbound))
        .with_state(state)
}

async fn banner() -> &'static str {
    BANNER
}

async fn health_check() -> &'static str {
    "OK"
}

async fn webhook_alive() -> &'static str {
    WEBHOOK_ALIVE
}

async fn inbound(
    State(state): State<Arc<WebhookState>>,
    form: Result<Form<InboundMessage>, FormRejection>,
) -> Response {
    let request_id = uuid::Uuid::now_v7();
    let span = tracing::info_span!("webhook", request_id = %request_id);

    async move {
        let reply = match form {
            Ok(Form(message)) => match state.handle(message).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "failed to process message");
                    crate::persona::processing_apology(&format!("{e:#}"))
                }
            },
            Err(rejection) => {
                tracing::warn!(error = %rejection, "malformed webhook form");
                crate::persona::processing_apology(&rejection.body_text())
            }
        };

        let twiml: MessagingResponse = split_for_channel(&reply, state.channel.max_reply_chars)
            .into_iter()
            .collect();
        tracing::debug!(messages = twiml.messages().len(), "replying");

        ([(header::CONTENT_TYPE, "application/xml")], twiml.to_string()).into_response()
    }
    .instrument(span)
    .await
}
