//! crates/shadowcore_core/src/ai.rs
//!
//! AI calls routed through the secondary identity SDK, using the model the user picked
//! in their profile.

use std::sync::Arc;
use tracing::error;

use crate::domain::{ChatMessage, ChatOptions, ChatResponse};
use crate::models::DEFAULT_MODEL_ID;
use crate::ports::{PortError, PortResult};
use crate::secondary::SecondaryIdentity;
use crate::store::SessionStore;

pub struct AiGateway {
    store: SessionStore,
    secondary: Arc<SecondaryIdentity>,
}

impl AiGateway {
    pub fn new(store: SessionStore, secondary: Arc<SecondaryIdentity>) -> Self {
        Self { store, secondary }
    }

    /// SDK is up and the secondary identity is signed in.
    pub fn is_ready(&self) -> bool {
        let view = self.store.secondary_view();
        view.is_ready && view.is_authenticated
    }

    /// SDK is up but the user still has to sign in to it.
    pub fn requires_auth(&self) -> bool {
        let view = self.store.secondary_view();
        view.is_ready && !view.is_authenticated
    }

    /// Sends `messages` with the user's preferred model. Any model set in `options` is
    /// overridden.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> PortResult<ChatResponse> {
        let sdk = self
            .secondary
            .sdk()
            .ok_or_else(|| PortError::Unavailable("secondary identity SDK not loaded".into()))?;

        let state = self.store.snapshot();
        if !state.is_secondary_authenticated {
            return Err(PortError::Unauthorized);
        }

        let model = state
            .profile
            .as_ref()
            .map(|p| p.preferred_model_or_default())
            .unwrap_or(DEFAULT_MODEL_ID)
            .to_string();
        let options = ChatOptions {
            model: Some(model),
            ..options
        };

        sdk.chat(messages, &options).await.map_err(|e| {
            error!("AI request failed: {}", e);
            e
        })
    }

    pub async fn prompt(&self, text: &str) -> PortResult<ChatResponse> {
        self.chat(&[ChatMessage::user(text)], ChatOptions::default())
            .await
    }
}
