//! The reply orchestrator.
//!
//! [`Akira::reply`] runs one conversational turn for one user: load state,
//! try the local command table, otherwise ask the completion service with the
//! composed context, then append the exchange and save.

use std::sync::Arc;

use anyhow::Result;

use crate::completion::{CompletionRequest, CompletionService};
use crate::config::{AkiraConfig, SaveErrorPolicy};
use crate::locks::UserLocks;
use crate::media::analyzer::MediaAnalyzer;
use crate::media::MediaMode;
use crate::memory::types::UserState;
use crate::memory::{commands, context};
use crate::store::{StateStore, StoreError, UserKey};

#[derive(Debug, thiserror::Error)]
pub enum AkiraError {
    #[error("conversation state store failed: {0}")]
    Storage(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct AkiraSettings {
    pub persona: String,
    /// Number of user/assistant pairs sent as context.
    pub history_window: usize,
    pub temperature: f32,
    pub on_save_error: SaveErrorPolicy,
}

impl AkiraSettings {
    pub fn from_config(config: &AkiraConfig) -> Self {
        Self {
            persona: config.conversation.persona.clone(),
            history_window: config.conversation.history_window,
            temperature: config.completion.temperature,
            on_save_error: config.storage.on_save_error,
        }
    }
}

impl Default for AkiraSettings {
    fn default() -> Self {
        Self::from_config(&AkiraConfig::default())
    }
}

pub struct Akira {
    store: Arc<dyn StateStore>,
    completion: Arc<dyn CompletionService>,
    analyzer: MediaAnalyzer,
    locks: UserLocks,
    settings: AkiraSettings,
}

impl Akira {
    pub fn new(
        store: Arc<dyn StateStore>,
        completion: Arc<dyn CompletionService>,
        analyzer: MediaAnalyzer,
        settings: AkiraSettings,
    ) -> Self {
        Self {
            store,
            completion,
            analyzer,
            locks: UserLocks::new(),
            settings,
        }
    }

    /// Wire the configured store, completion service and media analyzer.
    pub fn from_config(config: &AkiraConfig) -> Result<Self> {
        let store = crate::store::open_store(config)?;
        let completion = crate::completion::create_service(&config.completion)?;
        let analyzer = MediaAnalyzer::from_config(Arc::clone(&completion), config);
        tracing::info!(
            backend = store.backend(),
            model = completion.model(),
            "akira ready"
        );
        Ok(Self::new(
            store,
            completion,
            analyzer,
            AkiraSettings::from_config(config),
        ))
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Answer one message from `sender_id`.
    ///
    /// Completion failures become an apology reply. Errors are a state that
    /// cannot be read (nothing is saved then), save failures under
    /// [`SaveErrorPolicy::Fail`], and panicked store tasks.
    pub async fn reply(&self, sender_id: &str, message: &str) -> Result<String, AkiraError> {
        let key = UserKey::sanitize(sender_id);
        let _turn = self.locks.lock(&key).await;

        let mut state = {
            let store = Arc::clone(&self.store);
            let key = key.clone();
            tokio::task::spawn_blocking(move || store.read_or_fresh(&key)).await??
        };

        let reply = match commands::handle(message, &mut state.memory) {
            Some(command) => {
                tracing::info!(user = %key, intent = command.intent.as_str(), "command handled");
                command.text
            }
            None => self.complete(&key, &state, message).await,
        };

        state.record_exchange(message, reply.as_str());
        self.persist(key, state).await?;
        Ok(reply)
    }

    /// Analyze an attachment. Never fails; problems come back as text.
    pub async fn reply_to_media(&self, content_type: &str, data: Vec<u8>, mode: MediaMode) -> String {
        tracing::info!(content_type, bytes = data.len(), mode = ?mode, "analyzing media");
        self.analyzer.analyze(content_type, data, mode).await
    }

    async fn complete(&self, key: &UserKey, state: &UserState, message: &str) -> String {
        let messages = context::compose(
            &self.settings.persona,
            &state.memory,
            state.recent_history(self.settings.history_window),
            message,
        );
        let request = CompletionRequest::new(messages).with_temperature(self.settings.temperature);

        match self.completion.complete(request).await {
            Ok(text) => {
                tracing::debug!(user = %key, chars = text.chars().count(), "completion received");
                text
            }
            Err(e) => {
                tracing::warn!(user = %key, error = %e, "completion failed");
                crate::persona::connection_apology(&e)
            }
        }
    }

    async fn persist(&self, key: UserKey, state: UserState) -> Result<(), AkiraError> {
        let store = Arc::clone(&self.store);
        let user = key.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(&key, &state)).await?;

        match (saved, self.settings.on_save_error) {
            (Ok(()), _) => Ok(()),
            (Err(e), SaveErrorPolicy::Log) => {
                tracing::warn!(user = %user, error = %e, "failed to save state");
                Ok(())
            }
            (Err(e), SaveErrorPolicy::Fail) => Err(e.into()),
        }
    }
}
