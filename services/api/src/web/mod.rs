pub mod auth;
pub mod middleware;
pub mod profile;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use self::middleware::{require_user, route_guard};
use self::rest::feature_placeholder;
use self::state::AppState;

/// Builds the application router. The route guard wraps every route; the API
/// routes additionally require a verified user.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(rest::health_handler))
        .route("/api/models", get(rest::models_handler))
        .route("/auth/callback", get(auth::callback_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/login", get(auth::login_handler));

    // API routes (user required)
    let api_routes = Router::new()
        .route(
            "/api/user/profile",
            get(profile::get_profile_handler).patch(profile::update_profile_handler),
        )
        .route(
            "/api/user/preferences",
            get(profile::get_preference_handler).patch(profile::update_preference_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_user,
        ));

    // Feature areas, protected by the route guard
    let feature_routes = Router::new()
        .route("/synthesio", get(|| feature_placeholder("synthesio")))
        .route("/synthesio/{*rest}", get(|| feature_placeholder("synthesio")))
        .route("/ghostwrite", get(|| feature_placeholder("ghostwrite")))
        .route("/ghostwrite/{*rest}", get(|| feature_placeholder("ghostwrite")))
        .route("/flowy", get(|| feature_placeholder("flowy")))
        .route("/flowy/{*rest}", get(|| feature_placeholder("flowy")));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(feature_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            route_guard,
        ))
        .with_state(state)
}
