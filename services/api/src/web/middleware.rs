//! services/api/src/web/middleware.rs
//!
//! Request interceptors: the route guard for page paths and the user requirement for
//! API endpoints. Both validate the session cookie with the identity server; the cookie
//! itself is never trusted.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use shadowcore_core::domain::PrimaryUser;
use shadowcore_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::HandlerError;
use crate::web::state::AppState;

pub const LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/synthesio";
pub const PROTECTED_PREFIXES: [&str; 3] = ["/synthesio", "/ghostwrite", "/flowy"];

/// The outcome of the guard's identity check, attached to every request it lets through.
#[derive(Clone, Debug)]
pub struct VerifiedUser(pub Option<PrimaryUser>);

/// Reads one cookie value from the `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// Whether `path` falls under a protected feature area.
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Validates the session cookie, if any, against the identity server.
async fn verify(state: &AppState, headers: &HeaderMap) -> Option<PrimaryUser> {
    let token = cookie_value(headers, &state.config.session_cookie)?;
    match state.identity.get_user(token).await {
        Ok(user) => Some(user),
        Err(PortError::Unauthorized) => {
            debug!("Session cookie rejected by identity server.");
            None
        }
        Err(e) => {
            warn!("Failed to validate session: {}", e);
            None
        }
    }
}

/// Redirects anonymous requests away from protected paths and signed-in requests away
/// from the login page. Everything else passes through with a [`VerifiedUser`] attached.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = verify(&state, req.headers()).await;
    let path = req.uri().path();

    if user.is_none() && is_protected(path) {
        let target = format!("{}?next={}", LOGIN_PATH, urlencoding::encode(path));
        return Redirect::temporary(&target).into_response();
    }

    if user.is_some() && path == LOGIN_PATH {
        return Redirect::temporary(DEFAULT_LANDING_PATH).into_response();
    }

    req.extensions_mut().insert(VerifiedUser(user));
    next.run(req).await
}

/// Middleware for API routes: requires a verified user and exposes it to handlers as an
/// `Extension<PrimaryUser>`. Answers 401 otherwise.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HandlerError> {
    // Reuse the guard's verification when it already ran for this request.
    let user = match req.extensions().get::<VerifiedUser>() {
        Some(VerifiedUser(user)) => user.clone(),
        None => verify(&state, req.headers()).await,
    };

    let user = user.ok_or(HandlerError::Unauthorized)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn protected_prefixes_match_whole_segments() {
        assert!(is_protected("/synthesio"));
        assert!(is_protected("/ghostwrite/drafts/1"));
        assert!(is_protected("/flowy/"));
        assert!(!is_protected("/synthesiology"));
        assert!(!is_protected("/login"));
        assert!(!is_protected("/"));
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def; other=1"),
        );
        assert_eq!(cookie_value(&headers, "session"), Some("abc.def"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(cookie_value(&headers, "session"), None);
    }
}
