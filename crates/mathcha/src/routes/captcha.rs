//! CAPTCHA generation, image, and verification endpoints.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use mathcha_common::{CaptchaError, VerifyResult};

#[derive(Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub key: String,
    pub image_url: String,
    pub expires_in_secs: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    retryable: bool,
}

/// Map a library error to an HTTP error response
fn error_response(err: CaptchaError) -> (StatusCode, Json<ErrorResponse>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            retryable: err.is_retryable(),
        }),
    )
}

/// Generate a new CAPTCHA challenge
pub async fn get_challenge(
    State(state): State<AppState>,
) -> Result<Json<ChallengeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let key = state.captchas.generate().await.map_err(|e| {
        tracing::warn!(error = %e, "CAPTCHA generation failed");
        error_response(e)
    })?;

    let now = chrono::Utc::now().timestamp();
    let expires_in_secs = state
        .captchas
        .info(&key)
        .await
        .map(|ticket| ticket.expires_in_secs(now))
        .unwrap_or(0);

    tracing::debug!(key = %key, "Issued CAPTCHA challenge");

    Ok(Json(ChallengeResponse {
        image_url: format!("/image/{}", key),
        key,
        expires_in_secs,
    }))
}

/// Serve the rendered PNG for a challenge
pub async fn get_image(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let Some(path) = state.captchas.image(&key).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], Body::from(bytes)).into_response(),
        Err(e) => {
            tracing::debug!(key = %key, path = ?path, error = %e, "Image missing on disk");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    key: String,
    answer: f64,
    /// Decimal places to compare at (defaults to the configured value)
    places: Option<u32>,
}

/// Verify an answer. Challenges are single-use: the challenge is cleaned
/// up whatever the outcome.
pub async fn verify_challenge(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Json<VerifyResult> {
    let places = payload.places.unwrap_or(state.config.answer_places);
    let known = state.captchas.info(&payload.key).await.is_some();
    let success = state
        .captchas
        .check(&payload.key, payload.answer, places)
        .await;

    state.captchas.cleanup(&payload.key).await;

    tracing::debug!(key = %payload.key, success, "Verified CAPTCHA answer");

    let error_message = match (success, known) {
        (true, _) => None,
        (false, true) => Some("Incorrect answer".to_string()),
        (false, false) => Some("Challenge expired or invalid".to_string()),
    };

    Json(VerifyResult {
        success,
        error_message,
    })
}

/// Drop a challenge before it expires
pub async fn delete_challenge(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> StatusCode {
    state.captchas.cleanup(&key).await;
    StatusCode::NO_CONTENT
}
