//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: the OAuth callback, the login page data and logout.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use shadowcore_core::domain::{PrimarySession, ProfileSeed};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::web::middleware::{cookie_value, DEFAULT_LANDING_PATH, LOGIN_PATH};
use crate::web::state::AppState;

/// Lifetime of the session cookie when the identity server gives no expiry.
const SESSION_MAX_AGE_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct CallbackParams {
    /// Authorization code issued by the identity provider.
    pub code: Option<String>,
    /// Path to return to after sign-in.
    pub next: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct LoginParams {
    pub error: Option<String>,
    pub next: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// User-facing message for the `error` code, if one was given.
    pub error_message: Option<String>,
    pub next: String,
    /// Where the browser should go to start the provider sign-in.
    pub sign_in_url: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Maps a sign-in error code to the message shown on the login page.
pub fn login_error_message(code: &str) -> &'static str {
    match code {
        "missing_code" => "Authorization code was missing. Please try again.",
        "auth_failed" => "Authentication failed. Please try again.",
        _ => "An error occurred during sign in. Please try again.",
    }
}

/// Keeps only same-site absolute paths; anything else falls back to the landing path.
pub fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => DEFAULT_LANDING_PATH.to_string(),
    }
}

fn code_verifier_cookie(session_cookie: &str) -> String {
    format!("{}-code-verifier", session_cookie)
}

fn session_cookie(name: &str, session: &PrimarySession) -> String {
    let max_age = session
        .expires_at
        .map(|at| (at - Utc::now()).num_seconds().max(0))
        .unwrap_or_else(|| Duration::days(SESSION_MAX_AGE_DAYS).num_seconds());
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        name, session.access_token, max_age
    )
}

fn expired_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", name)
}

fn login_redirect(error_code: &str) -> Response {
    Redirect::temporary(&format!("{}?error={}", LOGIN_PATH, error_code)).into_response()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /auth/callback - Complete the OAuth sign-in
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackParams),
    responses(
        (status = 307, description = "Redirect to `next` on success, or to /login with an error code")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    // 1. Require an authorization code
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("OAuth callback without authorization code.");
        return login_redirect("missing_code");
    };

    // 2. Exchange the code for a session
    let verifier_cookie = code_verifier_cookie(&state.config.session_cookie);
    let verifier = cookie_value(&headers, &verifier_cookie);
    let session = match state.identity.exchange_code(&code, verifier).await {
        Ok(session) => session,
        Err(e) => {
            error!("OAuth callback error: {:?}", e);
            return login_redirect("auth_failed");
        }
    };

    // 3. Upsert the profile. A failure here must not abort the sign-in.
    if let Err(e) = state
        .profiles
        .upsert_profile(&ProfileSeed::from(&session.user))
        .await
    {
        warn!("Profile upsert error for {}: {:?}", session.user.id, e);
    }
    info!("User {} signed in.", session.user.id);

    // 4. Set the session cookie and redirect to the requested page
    let next = sanitize_next(params.next.as_deref());
    let cookies = AppendHeaders([
        (
            header::SET_COOKIE,
            session_cookie(&state.config.session_cookie, &session),
        ),
        (header::SET_COOKIE, expired_cookie(&verifier_cookie)),
    ]);
    (cookies, Redirect::temporary(&next)).into_response()
}

/// GET /login - Data for the login page
#[utoipa::path(
    get,
    path = "/login",
    params(LoginParams),
    responses(
        (status = 200, description = "Login page data", body = LoginResponse),
        (status = 307, description = "Already signed in; redirect to the landing page")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoginParams>,
) -> Json<LoginResponse> {
    let next = sanitize_next(params.next.as_deref());
    let callback = format!(
        "{}/auth/callback?next={}",
        state.config.public_url,
        urlencoding::encode(&next)
    );
    let sign_in_url = format!(
        "{}/auth/v1/authorize?provider={}&redirect_to={}",
        state.config.identity_url,
        urlencoding::encode(&state.config.oauth_provider),
        urlencoding::encode(&callback)
    );

    Json(LoginResponse {
        error_message: params
            .error
            .as_deref()
            .map(|code| login_error_message(code).to_string()),
        next,
        sign_in_url,
    })
}

/// POST /auth/logout - Clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            expired_cookie(&state.config.session_cookie),
        )],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_messages() {
        assert_eq!(
            login_error_message("missing_code"),
            "Authorization code was missing. Please try again."
        );
        assert_eq!(
            login_error_message("auth_failed"),
            "Authentication failed. Please try again."
        );
        assert_eq!(
            login_error_message("something_else"),
            "An error occurred during sign in. Please try again."
        );
    }

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(sanitize_next(Some("/flowy/contacts")), "/flowy/contacts");
        assert_eq!(sanitize_next(None), "/synthesio");
        assert_eq!(sanitize_next(Some("https://evil.example")), "/synthesio");
        assert_eq!(sanitize_next(Some("//evil.example")), "/synthesio");
        assert_eq!(sanitize_next(Some("/\\evil.example")), "/synthesio");
    }
}
