//! crates/shadowcore_core/src/domain.rs
//!
//! Defines the core data structures shared by the session layer and the API service.
//! These structs carry serde derives because they cross the HTTP boundary as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::DEFAULT_MODEL_ID;

/// A user whose identity has been verified by the identity server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Display name taken from the OAuth provider metadata, if any.
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// The cookie-backed session issued by the identity server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySession {
    pub user: PrimaryUser,
    /// Opaque bearer token. Never inspected locally.
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The identity exposed by the third-party SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryUser {
    pub username: String,
    pub uuid: String,
    pub email: Option<String>,
}

/// Per-user application settings, keyed by the primary user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub preferred_model: Option<String>,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// The preferred model id, falling back to the catalog default when unset.
    pub fn preferred_model_or_default(&self) -> &str {
        self.preferred_model.as_deref().unwrap_or(DEFAULT_MODEL_ID)
    }

    /// Applies a partial update in place. Absent fields are left untouched.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(full_name) = &update.full_name {
            self.full_name = full_name.clone();
        }
        if let Some(avatar_url) = &update.avatar_url {
            self.avatar_url = avatar_url.clone();
        }
        if let Some(settings) = &update.settings {
            self.settings = settings.clone();
        }
    }
}

/// The fields a user may change on their own profile.
///
/// The outer `Option` says whether the field was sent at all; the inner one carries
/// an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The data written when a user completes the primary sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSeed {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&PrimaryUser> for ProfileSeed {
    fn from(user: &PrimaryUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Change notifications emitted by the primary identity client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryAuthEvent {
    InitialSession(Option<PrimarySession>),
    SignedIn(PrimarySession),
    SignedOut,
    TokenRefreshed(PrimarySession),
    UserUpdated(PrimarySession),
}

/// A single chat turn sent to the AI capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub usage: Option<ChatUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: Some("a@example.com".into()),
            full_name: Some("Ada".into()),
            avatar_url: Some("https://img/a.png".into()),
            preferred_model: None,
            settings: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update: ProfileUpdate =
            serde_json::from_value(json!({ "avatar_url": null })).unwrap();
        assert_eq!(update.avatar_url, Some(None));
        assert_eq!(update.full_name, None);

        let mut p = profile();
        p.apply(&update);
        assert_eq!(p.avatar_url, None);
        assert_eq!(p.full_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn preferred_model_falls_back_to_default() {
        let mut p = profile();
        assert_eq!(p.preferred_model_or_default(), "claude-opus-4.5");
        p.preferred_model = Some("o3".into());
        assert_eq!(p.preferred_model_or_default(), "o3");
    }
}
