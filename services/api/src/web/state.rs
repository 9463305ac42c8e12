//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use shadowcore_core::ports::{IdentityVerifier, ProfileRepository};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileRepository>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub config: Arc<Config>,
}
