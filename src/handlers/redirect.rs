use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::RelayError;
use crate::filter;
use crate::metrics::{NOT_FOUND_TOTAL, REDIRECTS_TOTAL, REQUEST_LATENCY};
use crate::models::RedirectQuery;
use crate::page::{self, RedirectPage, security_headers};
use crate::state::AppState;

/// `GET /redirect/{id}`: resolve a registered token and hand off.
pub async fn redirect_by_token(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
) -> Response {
    let start_time = Instant::now();
    // a segment that doesn't even decode can't name a token
    let result = id
        .map_err(|_| RelayError::NotFound)
        .and_then(|Path(id)| state.store.resolve(&id).map_err(RelayError::from))
        .and_then(|url| hand_off(&state, &url));
    respond(result, start_time)
}

/// `GET /redirect?url=`: clean and hand off without touching the store.
pub async fn redirect_direct(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RedirectQuery>, QueryRejection>,
) -> Response {
    let start_time = Instant::now();
    let result = query
        .ok()
        .and_then(|Query(query)| query.url)
        .filter(|url| !url.trim().is_empty())
        .ok_or(RelayError::MissingUrl)
        .and_then(|url| hand_off(&state, &url));
    respond(result, start_time)
}

// Resolved -> Cleaned -> Rendered
fn hand_off(state: &AppState, raw: &str) -> Result<RedirectPage, RelayError> {
    let clean_url = filter::clean(raw)?;
    Ok(page::render(&clean_url, state.delay.sample()))
}

fn respond(result: Result<RedirectPage, RelayError>, start_time: Instant) -> Response {
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    match result {
        Ok(page) => {
            REDIRECTS_TOTAL.inc();
            debug!("serving redirect page");
            page.into_response()
        }
        Err(err) => {
            if matches!(err, RelayError::NotFound) {
                NOT_FOUND_TOTAL.inc();
            }
            // failures get the same no-cache, no-referrer treatment
            (security_headers(), err).into_response()
        }
    }
}
