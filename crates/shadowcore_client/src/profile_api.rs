//! crates/shadowcore_client/src/profile_api.rs
//!
//! HTTP implementation of the `ProfileApi` port, talking to the service's
//! `/api/user/*` endpoints with the primary session cookie.

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use shadowcore_core::domain::{Profile, ProfileUpdate};
use shadowcore_core::ports::{PortError, PortResult, ProfileApi};
use tracing::debug;

const PROFILE_PATH: &str = "/api/user/profile";
const PREFERENCES_PATH: &str = "/api/user/preferences";

#[derive(Deserialize)]
struct ProfileEnvelope {
    profile: Profile,
}

#[derive(Deserialize)]
struct PreferenceEnvelope {
    preferred_model: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// A `ProfileApi` adapter backed by `reqwest`.
#[derive(Clone)]
pub struct HttpProfileApi {
    client: Client,
    base_url: String,
    cookie: String,
}

impl HttpProfileApi {
    /// `base_url` is the service origin; `cookie_name`/`access_token` form the session
    /// cookie sent with every request.
    pub fn new(client: Client, base_url: &str, cookie_name: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie: format!("{}={}", cookie_name, access_token),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::COOKIE, &self.cookie)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let status = response.status();
        debug!("Profile API responded with {}", status);

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()));
        }
        Err(error_from_response(status, response).await)
    }
}

async fn error_from_response(status: StatusCode, response: Response) -> PortError {
    let message = response
        .json::<ErrorEnvelope>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| status.to_string());
    map_status(status, message)
}

/// Maps an unsuccessful status onto the port error taxonomy.
pub(crate) fn map_status(status: StatusCode, message: String) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        StatusCode::BAD_REQUEST => PortError::Rejected(message),
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        _ => PortError::Unexpected(message),
    }
}

#[async_trait]
impl ProfileApi for HttpProfileApi {
    async fn fetch_profile(&self) -> PortResult<Profile> {
        let envelope: ProfileEnvelope = self.send(self.request(Method::GET, PROFILE_PATH)).await?;
        Ok(envelope.profile)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> PortResult<Profile> {
        let request = self.request(Method::PATCH, PROFILE_PATH).json(update);
        let envelope: ProfileEnvelope = self.send(request).await?;
        Ok(envelope.profile)
    }

    async fn fetch_preference(&self) -> PortResult<String> {
        let envelope: PreferenceEnvelope =
            self.send(self.request(Method::GET, PREFERENCES_PATH)).await?;
        Ok(envelope.preferred_model)
    }

    async fn update_preference(&self, model_id: &str) -> PortResult<String> {
        let request = self
            .request(Method::PATCH, PREFERENCES_PATH)
            .json(&json!({ "preferred_model": model_id }));
        let envelope: PreferenceEnvelope = self.send(request).await?;
        Ok(envelope.preferred_model)
    }
}
