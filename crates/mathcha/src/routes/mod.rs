//! HTTP route handlers for the demo server.

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod captcha;
mod health;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))

        // CAPTCHA endpoints
        .route("/challenge", get(captcha::get_challenge))
        .route("/challenge/{key}", delete(captcha::delete_challenge))
        .route("/image/{key}", get(captcha::get_image))
        .route("/verify", post(captcha::verify_challenge))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
