//! services/api/src/adapters/identity.rs
//!
//! This module contains the adapter for a GoTrue-compatible identity server
//! (the auth API used by Supabase). It implements the `IdentityVerifier` port.
//! Every call goes to the server; nothing is verified from local token contents.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use shadowcore_core::domain::{PrimarySession, PrimaryUser};
use shadowcore_core::ports::{IdentityVerifier, PortError, PortResult};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize, Default)]
struct UserMetadata {
    full_name: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

impl GoTrueUser {
    fn to_domain(self) -> PrimaryUser {
        let metadata = self.user_metadata.unwrap_or_default();
        PrimaryUser {
            id: self.id,
            email: self.email,
            full_name: metadata.full_name.or(metadata.name),
            avatar_url: metadata.avatar_url.or(metadata.picture),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: GoTrueUser,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `IdentityVerifier` port over HTTP.
#[derive(Clone)]
pub struct GoTrueIdentityAdapter {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl GoTrueIdentityAdapter {
    /// Creates a new `GoTrueIdentityAdapter`. `base_url` is the project URL without the
    /// `/auth/v1` suffix.
    pub fn new(client: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }
}

fn map_status(status: StatusCode, body: String) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PortError::Rejected(body),
        _ => PortError::Unexpected(format!("identity server returned {}: {}", status, body)),
    }
}

//=========================================================================================
// `IdentityVerifier` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityVerifier for GoTrueIdentityAdapter {
    async fn get_user(&self, access_token: &str) -> PortResult<PrimaryUser> {
        let response = self
            .client
            .get(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let user = response
            .json::<GoTrueUser>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(user.to_domain())
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> PortResult<PrimarySession> {
        let response = self
            .client
            .post(self.url("/token?grant_type=pkce"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Code exchange rejected with {}", status);
            return Err(map_status(status, body));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(PrimarySession {
            user: token.user.to_domain(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}
