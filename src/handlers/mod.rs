mod health;
mod metrics;
mod redirect;
mod register;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use redirect::{redirect_by_token, redirect_direct};
pub use register::register_handler;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::middleware::{rate_limit, strip_identifying_headers};
use crate::state::AppState;

/// Longest destination URL accepted by `register`
pub const MAX_URL_LEN: usize = 8 * 1024;

const MAX_BODY_BYTES: usize = 16 * 1024;

// layers run outside-in: CORS, header stripping, rate limit (relay routes only)
pub fn router(state: Arc<AppState>, allowed_origin: HeaderValue) -> Router {
    let mut relay = Router::new().route("/redirect", get(redirect_direct));
    if state.profile.uses_token_store() {
        relay = relay
            .route(
                "/register",
                post(register_handler).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
            )
            .route("/redirect/{id}", get(redirect_by_token));
    }
    let relay = relay.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let cors = CorsLayer::new()
        // only echoed back when the request's Origin matches
        .allow_origin(AllowOrigin::list([allowed_origin]))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(relay)
        .layer(middleware::from_fn(strip_identifying_headers))
        .layer(cors)
        .with_state(state)
}
