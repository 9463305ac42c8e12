//! services/api/src/web/profile.rs
//!
//! Profile and model preference endpoints for the signed-in user.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use shadowcore_core::domain::{PrimaryUser, Profile, ProfileUpdate};
use shadowcore_core::models::is_known_model;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::HandlerError;
use crate::web::state::AppState;

/// Fields a user may change through `PATCH /api/user/profile`.
const PROFILE_FIELDS: [&str; 3] = ["full_name", "avatar_url", "settings"];

//=========================================================================================
// Response Types
//=========================================================================================

/// Wire form of a profile row.
#[derive(Serialize, ToSchema)]
pub struct ProfileBody {
    pub id: uuid::Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub preferred_model: Option<String>,
    #[schema(value_type = Object)]
    pub settings: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Profile> for ProfileBody {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            avatar_url: p.avatar_url,
            preferred_model: p.preferred_model,
            settings: p.settings,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: ProfileBody,
}

#[derive(Serialize, ToSchema)]
pub struct PreferenceResponse {
    pub preferred_model: String,
}

//=========================================================================================
// Body Parsing
//=========================================================================================

fn json_object(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, HandlerError> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        _ => Err(HandlerError::bad_request("Invalid JSON body")),
    }
}

/// Keeps only the allowlisted fields and checks their types.
pub fn parse_profile_update(mut body: Map<String, Value>) -> Result<ProfileUpdate, HandlerError> {
    body.retain(|key, _| PROFILE_FIELDS.contains(&key.as_str()));
    serde_json::from_value(Value::Object(body))
        .map_err(|e| HandlerError::bad_request(format!("Invalid profile fields: {}", e)))
}

/// Extracts and validates `preferred_model` against the model catalog.
pub fn parse_preference(body: &Map<String, Value>) -> Result<&str, HandlerError> {
    let model_id = body
        .get("preferred_model")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HandlerError::bad_request("preferred_model is required"))?;

    if !is_known_model(model_id) {
        return Err(HandlerError::bad_request("Invalid model ID"));
    }
    Ok(model_id)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/user/profile - Fetch the current user's profile
#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<PrimaryUser>,
) -> Result<Json<ProfileResponse>, HandlerError> {
    let profile = state
        .profiles
        .get_profile(user.id)
        .await
        .map_err(|e| HandlerError::internal("Failed to fetch profile", e))?;
    Ok(Json(ProfileResponse {
        profile: profile.into(),
    }))
}

/// PATCH /api/user/profile - Update the current user's profile
#[utoipa::path(
    patch,
    path = "/api/user/profile",
    request_body(content = serde_json::Value, description = "Any of `full_name`, `avatar_url`, `settings`. Other fields are ignored."),
    responses(
        (status = 200, description = "The updated profile", body = ProfileResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<PrimaryUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProfileResponse>, HandlerError> {
    let update = parse_profile_update(json_object(body)?)?;

    let profile = state
        .profiles
        .update_profile(user.id, &update)
        .await
        .map_err(|e| HandlerError::internal("Failed to update profile", e))?;
    Ok(Json(ProfileResponse {
        profile: profile.into(),
    }))
}

/// GET /api/user/preferences - Fetch the current user's model preference
#[utoipa::path(
    get,
    path = "/api/user/preferences",
    responses(
        (status = 200, description = "The preferred model id", body = PreferenceResponse),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_preference_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<PrimaryUser>,
) -> Result<Json<PreferenceResponse>, HandlerError> {
    let profile = state
        .profiles
        .get_profile(user.id)
        .await
        .map_err(|e| HandlerError::internal("Failed to fetch preferences", e))?;
    Ok(Json(PreferenceResponse {
        preferred_model: profile.preferred_model_or_default().to_string(),
    }))
}

/// PATCH /api/user/preferences - Update the current user's model preference
#[utoipa::path(
    patch,
    path = "/api/user/preferences",
    request_body(content = serde_json::Value, description = "`{ \"preferred_model\": \"<catalog id>\" }`"),
    responses(
        (status = 200, description = "The stored preference", body = PreferenceResponse),
        (status = 400, description = "Missing or unknown model id"),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_preference_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<PrimaryUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PreferenceResponse>, HandlerError> {
    let body = json_object(body)?;
    let model_id = parse_preference(&body)?;

    let profile = state
        .profiles
        .update_preferred_model(user.id, model_id)
        .await
        .map_err(|e| HandlerError::internal("Failed to update preferences", e))?;
    info!("User {} switched model to {}", user.id, model_id);

    Ok(Json(PreferenceResponse {
        preferred_model: profile.preferred_model_or_default().to_string(),
    }))
}
