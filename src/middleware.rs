use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::RelayError;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::rate_limit::Admission;
use crate::state::AppState;

// never needed past the edge of the relay
pub const IDENTIFYING_HEADERS: &[&str] = &[
    "user-agent",
    "referer",
    "cookie",
    "forwarded",
    "via",
    "x-forwarded-for",
    "x-real-ip",
];

pub async fn strip_identifying_headers(mut request: Request<Body>, next: Next) -> Response {
    let headers = request.headers_mut();
    for name in IDENTIFYING_HEADERS {
        headers.remove(*name);
    }
    next.run(request).await
}

// peer comes from the socket; forwarding headers are already stripped
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client_key = match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => state.rate_limiter.client_key(addr.ip()),
        // no socket info: every such request shares one bucket
        None => "unknown".to_string(),
    };

    match state.rate_limiter.admit(&client_key) {
        Admission::Allowed => next.run(request).await,
        Admission::RateLimited { retry_after } => {
            RATE_LIMITED_TOTAL.inc();
            RelayError::RateLimited { retry_after }.into_response()
        }
    }
}
