//! services/api/src/web/rest.rs
//!
//! Contains the public REST handlers (health, model catalog, feature placeholders) and
//! the master definition for the OpenAPI specification.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shadowcore_core::models::AI_MODELS;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::web::{auth, profile, state::AppState};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        models_handler,
        auth::callback_handler,
        auth::login_handler,
        auth::logout_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::get_preference_handler,
        profile::update_preference_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ModelEntry,
            auth::LoginResponse,
            profile::ProfileBody,
            profile::ProfileResponse,
            profile::PreferenceResponse,
        )
    ),
    tags(
        (name = "SHADOWCORE API", description = "Sign-in, route protection and user settings.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub environment: String,
}

/// One entry of the model catalog.
#[derive(Serialize, ToSchema)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub tier: String,
    pub context_window: u32,
    pub is_default: bool,
}

#[derive(Serialize)]
pub struct FeatureStatus {
    pub module: &'static str,
    pub status: &'static str,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Report service liveness. No authentication required.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
    })
}

/// List the AI models a user can choose as their preference.
#[utoipa::path(
    get,
    path = "/api/models",
    responses(
        (status = 200, description = "The model catalog", body = [ModelEntry])
    )
)]
pub async fn models_handler() -> Json<Vec<ModelEntry>> {
    let entries = AI_MODELS
        .iter()
        .map(|m| ModelEntry {
            id: m.id.to_string(),
            name: m.name.to_string(),
            provider: m.provider.as_str().to_string(),
            tier: m.tier.as_str().to_string(),
            context_window: m.context_window,
            is_default: m.is_default,
        })
        .collect();
    Json(entries)
}

/// Placeholder body for the feature areas behind the route guard.
pub async fn feature_placeholder(module: &'static str) -> Json<FeatureStatus> {
    Json(FeatureStatus {
        module,
        status: "coming_soon",
    })
}
