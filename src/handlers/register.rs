use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use tracing::debug;

use super::MAX_URL_LEN;
use crate::error::RelayError;
use crate::metrics::{REGISTRATIONS_TOTAL, REQUEST_LATENCY, STORED_TOKENS};
use crate::models::{RegisterRequest, RegisterResponse};
use crate::state::AppState;

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, RelayError> {
    let start_time = Instant::now();

    let Json(request) = payload.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "register body rejected");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::UrlTooLong(MAX_URL_LEN)
        } else {
            // an unreadable body has no url either
            RelayError::MissingUrl
        }
    })?;

    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(RelayError::MissingUrl)?;
    if url.len() > MAX_URL_LEN {
        return Err(RelayError::UrlTooLong(MAX_URL_LEN));
    }

    let token = state.store.register(&url)?;

    REGISTRATIONS_TOTAL.inc();
    STORED_TOKENS.set(state.store.len() as f64);
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    debug!(stored = state.store.len(), "registered destination");

    Ok(Json(RegisterResponse {
        id: token.to_string(),
    }))
}
