//! crates/shadowcore_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the identity server,
//! the third-party SDK and profile storage all sit behind them, so the session layer
//! can be driven by fakes in tests and by real adapters in production.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatOptions, ChatResponse, PrimaryAuthEvent, PrimarySession, PrimaryUser,
    Profile, ProfileSeed, ProfileUpdate, SecondaryUser,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The capability behind the port is not available (e.g. the SDK failed to load).
    #[error("Unavailable: {0}")]
    Unavailable(String),
    /// The remote side refused the input as invalid.
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Client-side Ports
//=========================================================================================

/// The browser-side client of the cookie-based identity provider.
#[async_trait]
pub trait PrimaryIdentityClient: Send + Sync {
    /// Returns the user as verified by the identity server, not a cached claim.
    async fn get_current_user(&self) -> PortResult<Option<PrimaryUser>>;

    /// Returns the locally held session. Not to be used for authorization.
    async fn get_session(&self) -> PortResult<Option<PrimarySession>>;

    /// Starts the provider redirect; `redirect_target` is where the provider sends the
    /// user back to.
    async fn sign_in_with_provider(&self, redirect_target: &str) -> PortResult<()>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Subscribes to session changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<PrimaryAuthEvent>;
}

/// A loaded instance of the third-party identity + AI SDK.
#[async_trait]
pub trait SecondaryIdentitySdk: Send + Sync {
    async fn is_signed_in(&self) -> PortResult<bool>;

    async fn sign_in(&self) -> PortResult<SecondaryUser>;

    async fn sign_out(&self) -> PortResult<()>;

    async fn get_user(&self) -> PortResult<Option<SecondaryUser>>;

    /// Subscribes to SDK sign-in changes (`None` = signed out).
    fn subscribe(&self) -> broadcast::Receiver<Option<SecondaryUser>>;

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> PortResult<ChatResponse>;
}

/// Performs the single injection of the SDK script.
#[async_trait]
pub trait SdkLoader: Send + Sync {
    async fn load(&self) -> PortResult<Arc<dyn SecondaryIdentitySdk>>;
}

/// The profile REST API as seen from the browser.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn fetch_profile(&self) -> PortResult<Profile>;

    async fn update_profile(&self, update: &ProfileUpdate) -> PortResult<Profile>;

    async fn fetch_preference(&self) -> PortResult<String>;

    async fn update_preference(&self, model_id: &str) -> PortResult<String>;
}

//=========================================================================================
// Server-side Ports
//=========================================================================================

/// Server-side verification against the identity server.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Validates an access token by contacting the identity server.
    async fn get_user(&self, access_token: &str) -> PortResult<PrimaryUser>;

    /// Exchanges an OAuth authorization code for a session.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> PortResult<PrimarySession>;
}

/// Persistence of the `profiles` table.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    /// Inserts or refreshes the row for `seed.id`; never creates a duplicate.
    async fn upsert_profile(&self, seed: &ProfileSeed) -> PortResult<()>;

    /// Applies the allowlisted fields and stamps `updated_at`.
    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<Profile>;

    async fn update_preferred_model(&self, user_id: Uuid, model_id: &str) -> PortResult<Profile>;
}
